//! Prompt templates for the act/extract/observe primitives and the agent
//! system prompt.

/// Shared bridge API reference documenting the script surface, so the model
/// writes against the objects that actually exist in the namespace.
pub const BRIDGE_API_REFERENCE: &str = "\

## Bridge API Reference

### Live Objects
- `process` — Process handle: `.read_memory(addr, size)`, `.threads()`, `.selected_thread()`, \
`.state`, `.pid`, `.resume()`, `.memory_regions()`
- `thread` — Current thread: `.frames()`, `.selected_frame()`, `.step_over()`, `.step_into()`, \
`.step_out()`, `.step_instruction()`, `.stop_reason`
- `frame` — Current frame: `.variables()`, `.evaluate_expression(expr)`, `.disassemble(n)`, \
`.registers()`, `.pc`, `.function_name`
- `target` — Target: `.breakpoint_create_by_name(name)`, `.breakpoint_create_by_address(addr)`, \
`.modules()`, `.find_functions(name)`, `.triple`
- `debugger` — Debugger: `.execute_command(cmd)` for raw debugger CLI commands when needed

### Memory Utilities
- `read_string(process, addr)` -> string
- `read_pointer(process, addr)` -> int
- `read_u8(process, addr)` / `read_u16` / `read_u32` / `read_u64` -> int
- `write_u8(process, addr, value)` / `write_u16` / `write_u32` / `write_u64`
- `search_memory(process, start, size, pattern_blob)` -> array of addresses

### Helpers
- `hex(value)` -> \"0x...\" string
- `to_hex(blob)` / `from_hex(string)` for byte buffers
- `to_json(value)` / `parse_json(string)`
- `regex_match(pattern, text)` / `regex_find_all(pattern, text)`

### Tips
- Variables persist across act() calls within a session — build on previous computations
- Use `print()` to produce output — only printed output is captured
- `thread` and `frame` auto-refresh after each execution (reflects current debugger state)
- For raw debugger CLI commands: `debugger.execute_command(\"bt\").output`
- Prefer the script API over raw CLI — it is more reliable and composable
";

/// Prompt for the act primitive.
pub fn act_prompt(context: &str, instruction: &str) -> String {
    format!(
        "You are an expert debugger assistant. Given a natural language instruction and the \
         current process state, write Rhai code to accomplish the task using the bridge API.\n\n\
         ## Current Process State\n{context}\n\n\
         ## Instruction\n{instruction}\n\
         {BRIDGE_API_REFERENCE}\n\
         ## Rules\n\
         - Write Rhai code that uses the bridge API objects (process, thread, frame, target, debugger)\n\
         - Use print() to produce output — only printed output is captured\n\
         - Variables persist across act() calls within a session — you can reference previously defined variables\n\
         - Use the process state to determine the architecture and correct register names\n\
         - If the instruction is ambiguous, choose the most likely interpretation\n\
         - Prefer the script API over debugger.execute_command() when possible\n\n\
         ## Response Format\n\
         Return a JSON object with:\n\
         - \"code\": Rhai code string to execute\n\
         - \"reasoning\": brief explanation of the approach\n"
    )
}

/// Prompt for the extract primitive.
pub fn extract_prompt(context: &str, instruction: &str, schema: &str) -> String {
    format!(
        "You are an expert debugger assistant. Given the current process state and an \
         instruction, extract the requested structured information.\n\n\
         ## Current Process State\n{context}\n\n\
         ## Instruction\n{instruction}\n\n\
         ## Schema\nThe response must conform to this JSON schema:\n{schema}\n\n\
         ## Rules\n\
         - Extract information directly from the provided process state\n\
         - If information is not available in the state, use reasonable defaults or null values\n\
         - Be precise with addresses and numeric values\n\
         - Return valid JSON matching the schema exactly\n"
    )
}

/// Prompt for the observe primitive.
pub fn observe_prompt(context: &str, instruction: Option<&str>) -> String {
    let instruction_section = instruction
        .map(|text| format!("## User Focus\n{text}\n"))
        .unwrap_or_default();
    format!(
        "You are an expert debugger assistant. Analyze the current process state and suggest \
         useful debugging actions the user might want to take.\n\n\
         ## Current Process State\n{context}\n\n\
         {instruction_section}\
         {BRIDGE_API_REFERENCE}\n\
         ## Rules\n\
         - Suggest 3-8 relevant debugging actions ranked by usefulness\n\
         - Consider the current stop reason and program counter\n\
         - Suggest actions that would help understand the current state\n\
         - Include a mix of: inspection (registers, memory, variables), navigation (step, \
           continue), and analysis (backtrace, disassemble) actions\n\
         - Each suggestion should be a concrete Rhai code snippet using the bridge API with a \
           clear description\n\n\
         ## Response Format\n\
         Return a JSON object with:\n\
         - \"actions\": list of objects, each with \"code\" (Rhai code snippet) and \
           \"description\" (what it reveals)\n\
         - \"description\": overall summary of the observed state and why these actions are \
           suggested\n"
    )
}

/// System prompt for the tool-loop agent.
pub fn agent_system_prompt(
    strategy: &str,
    strategy_description: &str,
    task: &str,
    max_steps: u32,
) -> String {
    format!(
        "You are Wyrm, an autonomous debugger agent. You analyze programs by iterating through \
         observe -> act -> extract -> reason cycles.\n\n\
         You have access to the following tools:\n\
         - act(instruction): Execute a natural language debugging action\n\
         - set_breakpoint(location): Set a breakpoint by name or address\n\
         - read_memory(address, size): Read memory at an address\n\
         - step(mode): Step execution (over, into, out, instruction)\n\
         - continue_execution(): Continue process execution\n\
         - evaluate(expression): Evaluate an expression in the current frame\n\
         - done(result): Signal that you've completed the task\n\
         {BRIDGE_API_REFERENCE}\n\
         ## Strategy: {strategy}\n{strategy_description}\n\n\
         ## Task\n{task}\n\n\
         ## Rules\n\
         - Think step by step about what information you need\n\
         - Use the target triple from the process state to determine the architecture and \
           register names\n\
         - Stop when you've gathered enough information to answer the task\n\
         - Maximum steps: {max_steps}\n"
    )
}
