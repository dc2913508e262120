//! System prompt assembly: the tool catalogue the model is told about on
//! every call.

use locus_toolbus::ToolDescriptor;

pub fn build_system_prompt(tools: &[ToolDescriptor]) -> String {
    let mut prompt = String::from(
        "You are an autonomous coding agent. Use the tools available to you to \
         accomplish the user's request. Call a tool by name with the arguments \
         its schema describes; do not narrate a tool call instead of making one.",
    );

    if !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
    }

    prompt
}
