//! Capability descriptors — the statically declared surface the model is
//! told about at prompt-construction time.
//!
//! These are plain data handed to the loop's initialization: name,
//! parameter list, description. No runtime reflection over live callables.

use serde::{Deserialize, Serialize};

/// One callable available inside the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// The callable's name as visible to executed code.
    pub name: String,

    /// Ordered parameter names.
    pub parameters: Vec<String>,

    /// What it does, in a sentence — rendered into the system prompt.
    pub description: String,
}

impl Capability {
    pub fn new(
        name: impl Into<String>,
        parameters: &[&str],
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            description: description.into(),
        }
    }

    /// `name(param1, param2)` — the form used in prompt text.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameters.join(", "))
    }
}

/// The built-in completion capability every deployment carries: calling it
/// from sandboxed code ends the run with the supplied value.
pub fn final_answer_capability() -> Capability {
    Capability::new(
        "final_answer",
        &["answer"],
        "Declare the task finished and return the answer to the user.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_renders_parameters() {
        let cap = Capability::new("web_search", &["query", "max_results"], "Search the web.");
        assert_eq!(cap.signature(), "web_search(query, max_results)");
    }

    #[test]
    fn final_answer_is_always_declared() {
        let cap = final_answer_capability();
        assert_eq!(cap.name, "final_answer");
        assert_eq!(cap.parameters, vec!["answer".to_string()]);
    }
}
