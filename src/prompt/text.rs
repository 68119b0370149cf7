pub(crate) struct PromptText {
    pub title: String,
    pub description: String,
    pub prompt: String,
}

pub(crate) fn new_user_prompt() -> PromptText {
    PromptText {
        title: "cardgate".to_string(),
        description: "New user card scanned.\n\nEnter a name for the new user (optional).\nLeave empty or press Skip to use an automatic name.".to_string(),
        prompt: "Name:".to_string(),
    }
}
