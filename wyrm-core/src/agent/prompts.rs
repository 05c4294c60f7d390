//! Prompts for the REPL agent.

/// Nudge sent when a response contains no code blocks.
pub const REPL_NUDGE: &str = "Write Rhai code in a ```rhai block to make progress on the task.";

/// Wrap-up directive appended when the iteration budget is nearly exhausted.
pub const REPL_WRAP_UP: &str = "You are running low on iterations. Summarize your findings so \
     far and call done() with your results. Include what you discovered, any partial results, \
     and what remains unknown.";

/// Prompt used for history compaction: the model summarizes the span being
/// replaced.
pub const COMPACTION_PROMPT: &str = "Summarize the following debugging session transcript. \
     Preserve: the task, key discoveries (addresses, values, symbol names), variables that were \
     defined, and what remains to be done. Be concise.";

/// System prompt for the REPL agent.
pub fn repl_system_prompt(task: &str, llm_query_budget: u32, custom_tools_section: &str) -> String {
    format!(
        "You are Wyrm, an expert debugger that writes Rhai code to analyze programs.\n\n\
         You have a code REPL with live access to the debugger. Write code in ```rhai blocks.\n\n\
         ## Available Objects\n\
         - `process` — Process handle: .read_memory(addr, size), .threads(), .selected_thread(), .state, .pid\n\
         - `thread` — Current thread: .frames(), .selected_frame(), .step_over(), .step_into()\n\
         - `frame` — Current frame: .variables(), .evaluate_expression(expr), .disassemble(n), .registers(), .pc, .function_name\n\
         - `target` — Target: .breakpoint_create_by_name(name), .modules(), .find_functions(name), .triple\n\
         - `debugger` — Debugger: .execute_command(cmd) for raw debugger CLI commands\n\n\
         ## Memory Utilities\n\
         - read_string(process, addr) -> string\n\
         - read_pointer(process, addr) -> int\n\
         - read_u8/u16/u32/u64(process, addr) -> int\n\
         - write_u8/u16/u32/u64(process, addr, value)\n\
         - search_memory(process, start, size, pattern_blob) -> array of addresses\n\n\
         ## Helpers\n\
         hex, to_hex, from_hex, to_json, parse_json, regex_match, regex_find_all\n\n\
         ## Sub-queries\n\
         - llm_query(prompt, timeout_secs?) -> string — ask the model a sub-question from within your code\n\
         - Limited to {llm_query_budget} calls per iteration — use judiciously\n\
         - llm_query_batched(prompts, timeout_secs?) -> array — concurrent sub-queries (max 5)\n\
         - Good for: interpreting disassembly, classifying data, generating hypotheses\n\
         {custom_tools_section}\n\
         ## Rules\n\
         - Write Rhai code in ```rhai blocks — it will be executed and you'll see the output\n\
         - Variables persist across code blocks — build on previous computations\n\
         - Use print() to see values — only printed output is visible to you\n\
         - Call done(\"your findings summary\") when finished with a string result\n\
         - Call final_value(\"variable_name\") to return a structured variable as the result\n\
         - `thread` and `frame` auto-refresh after each block (reflects current debugger state)\n\
         - For raw debugger commands: debugger.execute_command(\"bt\").output\n\n\
         ## Task\n{task}\n"
    )
}

/// Format injected-tool docs for inclusion in the system prompt.
pub fn format_tools_section(tool_descriptions: &[(String, String)]) -> String {
    if tool_descriptions.is_empty() {
        return String::new();
    }
    let mut lines = vec!["\n## Custom Tools".to_string()];
    for (name, description) in tool_descriptions {
        if description.is_empty() {
            lines.push(format!("- `{name}`"));
        } else {
            lines.push(format!("- `{name}` — {description}"));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_embeds_task_and_budget() {
        let prompt = repl_system_prompt("find the overflow", 5, "");
        assert!(prompt.contains("find the overflow"));
        assert!(prompt.contains("Limited to 5 calls"));
        assert!(prompt.contains("```rhai"));
    }

    #[test]
    fn tools_section_renders_descriptions() {
        let section = format_tools_section(&[
            ("checksec".into(), "inspect protections".into()),
            ("bare".into(), String::new()),
        ]);
        assert!(section.contains("## Custom Tools"));
        assert!(section.contains("`checksec` — inspect protections"));
        assert!(section.contains("- `bare`"));
    }

    #[test]
    fn empty_tools_section_is_empty() {
        assert!(format_tools_section(&[]).is_empty());
    }
}
