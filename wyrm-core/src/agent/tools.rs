//! The fixed tool catalogue for the tool-loop agent.

use serde_json::json;

use wyrm_llm::ToolDefinition;

/// The seven tools exposed to the tool-loop agent.
pub fn agent_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "act".into(),
            description: "Execute a natural language debugging action. Translates the \
                          instruction into debugger commands and runs them."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "instruction": {
                        "type": "string",
                        "description": "Natural language instruction describing what to do \
                                        (e.g., 'set a breakpoint on main')",
                    },
                },
                "required": ["instruction"],
            }),
        },
        ToolDefinition {
            name: "set_breakpoint".into(),
            description: "Set a breakpoint at a function name or memory address.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "Function name or hex address (e.g., 'main' or \
                                        '0x100003f00')",
                    },
                },
                "required": ["location"],
            }),
        },
        ToolDefinition {
            name: "read_memory".into(),
            description: "Read memory at a given address.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "description": "Hex address to read from (e.g., '0x7fff5fbff8c0')",
                    },
                    "size": {
                        "type": "integer",
                        "description": "Number of bytes to read",
                        "default": 64,
                    },
                },
                "required": ["address"],
            }),
        },
        ToolDefinition {
            name: "step".into(),
            description: "Step execution by one instruction or line.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "mode": {
                        "type": "string",
                        "enum": ["over", "into", "out", "instruction"],
                        "description": "Step mode: over (step over), into (step into), out \
                                        (step out), instruction (single instruction)",
                        "default": "over",
                    },
                },
            }),
        },
        ToolDefinition {
            name: "continue_execution".into(),
            description: "Continue process execution until the next breakpoint or stop.".into(),
            parameters: json!({
                "type": "object",
                "properties": {},
            }),
        },
        ToolDefinition {
            name: "evaluate".into(),
            description: "Evaluate an expression in the current frame context.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Expression to evaluate (e.g., '*(int*)0x7fff5fbff8c0' \
                                        or 'argc')",
                    },
                },
                "required": ["expression"],
            }),
        },
        ToolDefinition {
            name: "done".into(),
            description: "Signal that the task is complete and provide the final result.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "result": {
                        "type": "string",
                        "description": "Summary of findings and conclusions",
                    },
                },
                "required": ["result"],
            }),
        },
    ]
}
