//! Context builder for agent prompts.

use crate::config::Config;
use crate::tools::ToolRunner;

use super::message::Message;

const IDENTITY: &str = "You are a multimodal research assistant. You are given images, \
video and audio together with a question. Ground every statement about the media in \
what you actually observe or hear, and say so when something is unclear.";

/// Context holds the tools and formatting choice for one agent run.
pub struct Context {
    pub tool_runner: ToolRunner,
    pub markdown: bool,
}

impl Context {
    /// Create a new context from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            tool_runner: ToolRunner::new_with_search(&config.search),
            markdown: config.markdown,
        }
    }

    /// Create a context around an existing tool runner.
    pub fn with_tools(tool_runner: ToolRunner, markdown: bool) -> Self {
        Self {
            tool_runner,
            markdown,
        }
    }

    /// Build the system prompt from identity, tool hints and formatting rules.
    pub fn build_system_prompt(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        parts.push(IDENTITY.to_string());

        let tools = self.tool_runner.tool_names();
        if !tools.is_empty() {
            parts.push(format!(
                "# Tools\n\nYou can search the web with: {}. Use them to find the latest \
                 updates or events related to the inputs, and cite the links you rely on.",
                tools.join(", ")
            ));
        }

        if self.markdown {
            parts.push("Use markdown to format your answers.".to_string());
        }

        parts.join("\n\n---\n\n")
    }

    /// Build the opening conversation: system prompt followed by the user turn.
    pub fn build_messages(&self, user: Message) -> Vec<Message> {
        vec![Message::system(self.build_system_prompt()), user]
    }

    /// Create a test context with no tools.
    #[cfg(test)]
    pub fn test() -> Self {
        Self::with_tools(ToolRunner::new(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Role;

    #[test]
    fn test_markdown_and_tools_in_prompt() {
        let ctx = Context::new(&Config::default());
        let prompt = ctx.build_system_prompt();
        assert!(prompt.contains("duckduckgo_search"));
        assert!(prompt.contains("markdown"));
    }

    #[test]
    fn test_plain_prompt() {
        let prompt = Context::test().build_system_prompt();
        assert!(prompt.starts_with("You are a multimodal research assistant."));
        assert!(!prompt.contains("# Tools"));
        assert!(!prompt.contains("markdown"));
        assert!(!prompt.contains("---"));
    }

    #[test]
    fn test_build_messages() {
        let ctx = Context::test();
        let messages = ctx.build_messages(Message::user("hi"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].text(), "hi");
    }
}
