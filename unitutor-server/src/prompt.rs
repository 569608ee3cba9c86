use unitutor_shared::TutorChatRequest;

/// Build the course-specialized system prompt for one chat turn.
pub fn build_system_prompt(request: &TutorChatRequest) -> String {
    format!(
        "You are UniTutor, a specialized AI tutor for the \"{course}\" programme.\n\
        \n\
        IMPORTANT CONTEXT:\n\
        - Programme Level: {level}\n\
        - Faculty: {faculty}\n\
        - Course Description: {description}\n\
        \n\
        YOUR ROLE:\n\
        You are an expert AI assistant helping students studying \"{course}\". \
        You know the course curriculum, concepts, and theories, practical \
        applications, exam preparation strategies, and career opportunities \
        in this field.\n\
        \n\
        GUIDELINES:\n\
        1. Always provide accurate, educational responses relevant to \"{course}\"\n\
        2. Use clear explanations suitable for {level} level students\n\
        3. Encourage critical thinking and provide study tips\n\
        4. If asked about topics outside your course expertise, politely \
        redirect to course-relevant topics\n\
        5. Be supportive, encouraging, and patient like a good tutor\n\
        6. Use markdown formatting for better readability\n\
        \n\
        Remember: you are here to help students succeed in their \"{course}\" studies!",
        course = request.course_name,
        level = request.course_level,
        faculty = request.faculty_name,
        description = request.course_description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitutor_shared::{ChatMessage, MessageRole};

    #[test]
    fn prompt_embeds_the_course_context() {
        let request = TutorChatRequest {
            messages: vec![ChatMessage {
                role: MessageRole::User,
                content: "hi".to_string(),
            }],
            course_id: "eng-elec-deg".to_string(),
            course_name: "Electrical Engineering".to_string(),
            course_level: "degree".to_string(),
            faculty_name: "Faculty of Engineering".to_string(),
            course_description: "Power electronics and control systems".to_string(),
        };

        let prompt = build_system_prompt(&request);
        assert!(prompt.contains("Electrical Engineering"));
        assert!(prompt.contains("Programme Level: degree"));
        assert!(prompt.contains("Faculty of Engineering"));
        assert!(prompt.contains("Power electronics and control systems"));
    }
}
