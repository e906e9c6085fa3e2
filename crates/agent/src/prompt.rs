//! System prompt construction.
//!
//! The prompt is assembled from statically declared inputs: the capability
//! descriptors handed to the loop at initialization and the configured
//! authorized-import list. Nothing is discovered by reflection at runtime.

use sandloop_core::capability::Capability;

const PROMPT_HEADER: &str = "\
You are an expert assistant who can solve any task using code. You will be \
given a task to solve as best you can.
To solve the task, you must plan forward and proceed in a cycle of Thought, \
Code, and Observation sequences.

At each step, in the 'Thought:' sequence, explain your reasoning towards \
solving the task. Then write a single block of simple Python code. During \
each intermediate step, you can use 'print()' to save whatever important \
information you will need. These print outputs appear in the 'Observation:' \
field, available as input for the next step.
In the end you must return a final answer using the `final_answer` function.

Here is an example:
---
Task: \"What is the result of the following operation: 5 + 3 + 1294.678?\"

Thought: I will use Python code to compute the result of the operation and \
then return the final answer using the `final_answer` function.
Code:
```python
result = 5 + 3 + 1294.678
final_answer(result)
```
---
";

const STRUCTURED_RULES: &str = "\
**CRITICAL INSTRUCTION: STRICT JSON OUTPUT**
Despite the text examples above, you MUST output your response in STRICT \
JSON format, complying with one of the following schemas:

1. **Thought**: to reason about the current state.
```json
{\"step\": {\"type\": \"thought\", \"content\": \"Your reasoning here...\"}}
```

2. **Plan**: to lay out the steps you intend to take.
```json
{\"step\": {\"type\": \"plan\", \"steps\": [\"first\", \"second\"]}}
```

3. **Code**: to write and execute Python code.
```json
{\"step\": {\"type\": \"code\", \"language\": \"python\", \"code\": \"print('Hello')\"}}
```

4. **Final Answer**: to provide the final answer to the user.
```json
{\"step\": {\"type\": \"final_answer\", \"answer\": \"The answer is 42.\"}}
```

**Rules:**
- Output ONE step at a time.
- After a 'code' step, you will receive an 'observation' with the execution result.
- Your code must be minimal and safe.
";

const FREE_TEXT_RULES: &str = "\
**Rules:**
- Always provide a Thought followed by a single ```python code block.
- After each code block, you will receive an 'Observation:' with the execution result.
- Your code must be minimal and safe.
";

/// Render the system prompt for one invocation.
pub fn render_system_prompt(
    capabilities: &[Capability],
    authorized_imports: &[String],
    structured: bool,
) -> String {
    let mut prompt = String::from(PROMPT_HEADER);

    prompt.push_str("\nYou have access to the following functions inside the interpreter:\n");
    for cap in capabilities {
        prompt.push_str(&format!("- {}: {}\n", cap.signature(), cap.description));
    }

    prompt.push_str(&format!(
        "\nYou strictly have access to a Python interpreter with the following \
         standard libraries allowed: {}.\n\n",
        authorized_imports.join(", ")
    ));

    prompt.push_str(if structured {
        STRUCTURED_RULES
    } else {
        FREE_TEXT_RULES
    });

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandloop_core::capability::final_answer_capability;

    #[test]
    fn prompt_names_capabilities_and_imports() {
        let caps = vec![
            final_answer_capability(),
            Capability::new("web_search", &["query"], "Search the web."),
        ];
        let imports = vec!["math".to_string(), "json".to_string()];

        let prompt = render_system_prompt(&caps, &imports, false);
        assert!(prompt.contains("final_answer(answer)"));
        assert!(prompt.contains("web_search(query)"));
        assert!(prompt.contains("math, json"));
    }

    #[test]
    fn structured_prompt_demands_json() {
        let prompt = render_system_prompt(&[final_answer_capability()], &[], true);
        assert!(prompt.contains("STRICT JSON"));
        assert!(prompt.contains(r#""type": "final_answer""#));
    }

    #[test]
    fn free_text_prompt_demands_fences() {
        let prompt = render_system_prompt(&[final_answer_capability()], &[], false);
        assert!(prompt.contains("```python code block"));
        assert!(!prompt.contains("STRICT JSON"));
    }
}
