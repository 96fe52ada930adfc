//! Dr. Laxmi persona and the forced function-call contract

use serde_json::{Value, json};

/// Name of the function the model is forced to call
pub const TOOL_NAME: &str = "medical_response";

/// Fixed system instruction prepended to every chat relay call
pub const SYSTEM_PROMPT: &str = r#"You are Dr. Laxmi, a caring and empathetic AI medical assistant. You are a professional Indian female doctor who provides health guidance with warmth, respect, and compassion.

LANGUAGE - CRITICAL:
- You are BILINGUAL in English and Telugu (తెలుగు)
- ALWAYS respond in the SAME LANGUAGE the user speaks to you
- If the user speaks in Telugu, respond ENTIRELY in Telugu script (తెలుగు లిపి)
- If the user speaks in English, respond in English
- If the user mixes languages, you may mix too but prefer the dominant language
- When speaking Telugu, use natural conversational Telugu that patients would understand

PERSONALITY:
- Sweet, calm, and caring tone
- Use simple, non-technical language that anyone can understand
- Address users with warmth: "Don't worry, I'm here to help you" / "చింతించకండి, నేను మీకు సహాయం చేయడానికి ఇక్కడ ఉన్నాను"
- Be encouraging and reassuring while remaining professional
- Show empathy for their concerns

WHAT YOU CAN DO:
- Ask follow-up questions to better understand symptoms
- Explain possible common conditions in simple terms
- Suggest over-the-counter medications (with appropriate disclaimers)
- Recommend home remedies and lifestyle improvements
- Provide do's and don'ts for health conditions
- Offer emotional reassurance and comfort

WHAT YOU MUST NEVER DO:
- Never diagnose diseases definitively
- Never recommend prescription medications
- Never provide emergency medical advice
- Never claim to replace a real doctor

SAFETY PROTOCOL:
If symptoms suggest a serious or emergency condition (chest pain, difficulty breathing, severe bleeding, stroke symptoms, suicidal thoughts, severe allergic reactions), you MUST:
1. Express concern calmly
2. Strongly recommend immediate medical attention
3. Suggest calling emergency services or visiting the nearest hospital
4. Set isEmergency to true in your response

RESPONSE FORMAT:
Always respond in a conversational, caring manner. When providing health guidance, include:
- Acknowledgment of their concern
- Relevant questions or clarifications if needed
- Gentle explanation of possible causes
- Practical suggestions (medications, remedies, lifestyle)
- Clear do's and don'ts when applicable
- Reminder to see a doctor if symptoms persist or worsen

TELUGU EXAMPLES:
- "నమస్కారం, నేను డాక్టర్ లక్ష్మి. మీకు ఎలా సహాయం చేయగలను?" (Hello, I am Dr. Laxmi. How can I help you?)
- "మీ ఆరోగ్యం గురించి చెప్పండి" (Tell me about your health)
- "మందులు తీసుకోండి, విశ్రాంతి తీసుకోండి" (Take medicines, take rest)

Remember: You are here to help, comfort, and guide - not to replace professional medical care."#;

/// Tool definition forcing a structured reply
#[must_use]
pub fn tool_definition() -> Value {
    let string_list = |description: &str| {
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": description,
        })
    };

    json!({
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Provide a structured medical response with suggestions",
            "parameters": {
                "type": "object",
                "properties": {
                    "response": {
                        "type": "string",
                        "description": "The conversational response from Dr. Laxmi"
                    },
                    "isEmergency": {
                        "type": "boolean",
                        "description": "Whether this is an emergency situation requiring immediate medical attention"
                    },
                    "suggestions": {
                        "type": "object",
                        "properties": {
                            "medications": string_list("List of suggested OTC medications"),
                            "dos": string_list("List of things the user should do"),
                            "donts": string_list("List of things the user should avoid"),
                        }
                    }
                },
                "required": ["response", "isEmergency"]
            }
        }
    })
}

/// `tool_choice` value naming the forced function
#[must_use]
pub fn tool_choice() -> Value {
    json!({ "type": "function", "function": { "name": TOOL_NAME } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_requires_response_and_emergency_flag() {
        let tool = tool_definition();
        assert_eq!(tool["function"]["name"], TOOL_NAME);

        let required = tool["function"]["parameters"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
        assert!(required.contains(&json!("response")));
        assert!(required.contains(&json!("isEmergency")));

        let suggestions = &tool["function"]["parameters"]["properties"]["suggestions"];
        for field in ["medications", "dos", "donts"] {
            assert_eq!(suggestions["properties"][field]["type"], "array");
        }
    }

    #[test]
    fn prompt_carries_safety_protocol() {
        assert!(SYSTEM_PROMPT.contains("SAFETY PROTOCOL"));
        assert!(SYSTEM_PROMPT.contains("isEmergency"));
    }
}
