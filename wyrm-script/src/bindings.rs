//! Rhai registrations for the debugger façade and memory utilities.
//!
//! This is the surface the model writes against: `debugger`, `target`,
//! `process`, `thread`, and `frame` live in the scope; memory readers,
//! writers, and encoding helpers are global functions. Façade errors map to
//! script runtime errors so they land in captured stderr.

use rhai::{Array, Blob, Dynamic, Engine, EvalAltResult, Map, Position};

use wyrm_bridge::{
    Breakpoint, Debugger, Frame, Process, Target, Thread, VariableNode, memory,
};

/// Convert a façade error into a script runtime error.
pub(crate) fn bridge_err(err: wyrm_bridge::BridgeError) -> Box<EvalAltResult> {
    msg_err(err.to_string())
}

/// Convert a plain message into a script runtime error.
pub(crate) fn msg_err(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

/// Register the full bridge API on `engine`.
pub fn register_bridge_api(engine: &mut Engine) {
    register_debugger(engine);
    register_target(engine);
    register_process(engine);
    register_thread(engine);
    register_frame(engine);
    register_breakpoint(engine);
    register_memory_utils(engine);
    register_helpers(engine);
}

fn register_debugger(engine: &mut Engine) {
    engine.register_type_with_name::<Debugger>("Debugger");
    engine.register_fn(
        "execute_command",
        |dbg: &mut Debugger, command: &str| -> Result<Map, Box<EvalAltResult>> {
            let result = dbg.execute_command(command).map_err(bridge_err)?;
            let mut map = Map::new();
            map.insert("output".into(), result.output.into());
            map.insert("error".into(), result.error.into());
            map.insert("succeeded".into(), result.succeeded.into());
            Ok(map)
        },
    );
}

fn register_target(engine: &mut Engine) {
    engine.register_type_with_name::<Target>("Target");
    engine.register_get("path", |t: &mut Target| t.path());
    engine.register_get("triple", |t: &mut Target| t.triple());
    engine.register_fn("modules", |t: &mut Target| -> Array {
        t.modules()
            .into_iter()
            .map(|module| {
                let mut map = Map::new();
                map.insert("name".into(), module.name.into());
                map.insert("path".into(), module.path.into());
                map.insert(
                    "uuid".into(),
                    module.uuid.map(Dynamic::from).unwrap_or(Dynamic::UNIT),
                );
                map.insert("base_address".into(), (module.base_address as i64).into());
                Dynamic::from(map)
            })
            .collect()
    });
    engine.register_fn("find_functions", |t: &mut Target, name: &str| -> Array {
        symbol_hits_to_array(t.find_functions(name))
    });
    engine.register_fn("find_symbols", |t: &mut Target, name: &str| -> Array {
        symbol_hits_to_array(t.find_symbols(name))
    });
    engine.register_fn("resolve_address", |t: &mut Target, address: i64| -> Map {
        let resolved = t.resolve_address(address as u64);
        let mut map = Map::new();
        map.insert("address".into(), (resolved.address as i64).into());
        map.insert(
            "symbol".into(),
            resolved.symbol.map(Dynamic::from).unwrap_or(Dynamic::UNIT),
        );
        map.insert(
            "module".into(),
            resolved.module.map(Dynamic::from).unwrap_or(Dynamic::UNIT),
        );
        map.insert("offset".into(), (resolved.offset as i64).into());
        map
    });
    engine.register_fn(
        "breakpoint_create_by_name",
        |t: &mut Target, name: &str| -> Result<Breakpoint, Box<EvalAltResult>> {
            t.breakpoint_create_by_name(name, None).map_err(bridge_err)
        },
    );
    engine.register_fn(
        "breakpoint_create_by_address",
        |t: &mut Target, address: i64| -> Result<Breakpoint, Box<EvalAltResult>> {
            t.breakpoint_create_by_address(address as u64)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "breakpoint_create_by_regex",
        |t: &mut Target, pattern: &str| -> Result<Breakpoint, Box<EvalAltResult>> {
            t.breakpoint_create_by_regex(pattern).map_err(bridge_err)
        },
    );
}

fn register_process(engine: &mut Engine) {
    engine.register_type_with_name::<Process>("Process");
    engine.register_get("pid", |p: &mut Process| p.pid() as i64);
    engine.register_get("state", |p: &mut Process| p.state().label().to_string());
    engine.register_fn(
        "read_memory",
        |p: &mut Process, address: i64, size: i64| -> Result<Blob, Box<EvalAltResult>> {
            p.read_memory(address as u64, size as usize)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "write_memory",
        |p: &mut Process, address: i64, data: Blob| -> Result<i64, Box<EvalAltResult>> {
            p.write_memory(address as u64, &data)
                .map(|written| written as i64)
                .map_err(bridge_err)
        },
    );
    engine.register_fn("threads", |p: &mut Process| -> Array {
        p.threads().into_iter().map(Dynamic::from).collect()
    });
    engine.register_fn("selected_thread", |p: &mut Process| -> Dynamic {
        p.selected_thread().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn(
        "resume",
        |p: &mut Process| -> Result<(), Box<EvalAltResult>> {
            p.continue_().map_err(bridge_err)
        },
    );
    engine.register_fn("stop", |p: &mut Process| -> Result<(), Box<EvalAltResult>> {
        p.stop().map_err(bridge_err)
    });
    engine.register_fn("kill", |p: &mut Process| -> Result<(), Box<EvalAltResult>> {
        p.kill().map_err(bridge_err)
    });
    engine.register_fn(
        "detach",
        |p: &mut Process| -> Result<(), Box<EvalAltResult>> { p.detach().map_err(bridge_err) },
    );
    engine.register_fn("memory_regions", |p: &mut Process| -> Array {
        p.memory_regions()
            .into_iter()
            .map(|region| {
                let mut map = Map::new();
                map.insert("start".into(), (region.start as i64).into());
                map.insert("end".into(), (region.end as i64).into());
                map.insert("readable".into(), region.readable.into());
                map.insert("writable".into(), region.writable.into());
                map.insert("executable".into(), region.executable.into());
                map.insert(
                    "name".into(),
                    region.name.map(Dynamic::from).unwrap_or(Dynamic::UNIT),
                );
                Dynamic::from(map)
            })
            .collect()
    });
}

fn register_thread(engine: &mut Engine) {
    engine.register_type_with_name::<Thread>("Thread");
    engine.register_get("id", |t: &mut Thread| t.id() as i64);
    engine.register_get("name", |t: &mut Thread| -> Dynamic {
        t.name().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_get("stop_reason", |t: &mut Thread| {
        t.stop_reason().label().to_string()
    });
    engine.register_get("num_frames", |t: &mut Thread| t.num_frames() as i64);
    engine.register_fn("selected_frame", |t: &mut Thread| t.selected_frame());
    engine.register_fn("frames", |t: &mut Thread| -> Array {
        t.frames(None).into_iter().map(Dynamic::from).collect()
    });
    engine.register_fn(
        "step_over",
        |t: &mut Thread| -> Result<(), Box<EvalAltResult>> { t.step_over().map_err(bridge_err) },
    );
    engine.register_fn(
        "step_into",
        |t: &mut Thread| -> Result<(), Box<EvalAltResult>> { t.step_into().map_err(bridge_err) },
    );
    engine.register_fn(
        "step_out",
        |t: &mut Thread| -> Result<(), Box<EvalAltResult>> { t.step_out().map_err(bridge_err) },
    );
    engine.register_fn(
        "step_instruction",
        |t: &mut Thread| -> Result<(), Box<EvalAltResult>> {
            t.step_instruction().map_err(bridge_err)
        },
    );
    engine.register_fn(
        "run_to_address",
        |t: &mut Thread, address: i64| -> Result<(), Box<EvalAltResult>> {
            t.run_to_address(address as u64).map_err(bridge_err)
        },
    );
}

fn register_frame(engine: &mut Engine) {
    engine.register_type_with_name::<Frame>("Frame");
    engine.register_get("pc", |f: &mut Frame| f.pc() as i64);
    engine.register_get("sp", |f: &mut Frame| f.sp() as i64);
    engine.register_get("fp", |f: &mut Frame| f.fp() as i64);
    engine.register_get("index", |f: &mut Frame| f.index() as i64);
    engine.register_get("function_name", |f: &mut Frame| -> Dynamic {
        f.function_name().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_get("module_name", |f: &mut Frame| -> Dynamic {
        f.module_name().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("line_entry", |f: &mut Frame| -> Dynamic {
        match f.line_entry() {
            Some(entry) => {
                let mut map = Map::new();
                map.insert("file".into(), entry.file.into());
                map.insert("line".into(), (entry.line as i64).into());
                map.insert(
                    "column".into(),
                    entry
                        .column
                        .map(|c| Dynamic::from(c as i64))
                        .unwrap_or(Dynamic::UNIT),
                );
                Dynamic::from(map)
            }
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn("registers", |f: &mut Frame| -> Map {
        let mut map = Map::new();
        for register in f.registers() {
            map.insert(register.name.into(), (register.value as i64).into());
        }
        map
    });
    engine.register_fn("variables", |f: &mut Frame| -> Array {
        f.variables()
            .iter()
            .map(|node| Dynamic::from(variable_to_map(node)))
            .collect()
    });
    engine.register_fn("arguments", |f: &mut Frame| -> Array {
        f.arguments()
            .iter()
            .map(|node| Dynamic::from(variable_to_map(node)))
            .collect()
    });
    engine.register_fn("evaluate_expression", |f: &mut Frame, expression: &str| {
        f.evaluate_expression(expression)
    });
    engine.register_fn("disassemble", |f: &mut Frame, count: i64| {
        f.disassemble(count as usize)
    });
    engine.register_fn("disassemble", |f: &mut Frame| f.disassemble(20));
}

fn register_breakpoint(engine: &mut Engine) {
    engine.register_type_with_name::<Breakpoint>("Breakpoint");
    engine.register_get("id", |bp: &mut Breakpoint| bp.id() as i64);
    engine.register_get("enabled", |bp: &mut Breakpoint| bp.enabled());
    engine.register_get("hit_count", |bp: &mut Breakpoint| bp.hit_count() as i64);
    engine.register_get("condition", |bp: &mut Breakpoint| -> Dynamic {
        bp.condition().map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("enable", |bp: &mut Breakpoint| bp.enable());
    engine.register_fn("disable", |bp: &mut Breakpoint| bp.disable());
    engine.register_fn("set_condition", |bp: &mut Breakpoint, condition: &str| {
        bp.set_condition(condition)
    });
    engine.register_fn("delete", |bp: &mut Breakpoint| bp.clone().delete());
}

fn register_memory_utils(engine: &mut Engine) {
    engine.register_fn(
        "read_string",
        |process: Process, address: i64| -> Result<String, Box<EvalAltResult>> {
            memory::read_string(&process, address as u64, memory::DEFAULT_STRING_MAX)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "read_string",
        |process: Process, address: i64, max_length: i64| -> Result<String, Box<EvalAltResult>> {
            memory::read_string(&process, address as u64, max_length as usize).map_err(bridge_err)
        },
    );
    engine.register_fn(
        "read_pointer",
        |process: Process, address: i64| -> Result<i64, Box<EvalAltResult>> {
            memory::read_pointer(&process, address as u64)
                .map(|v| v as i64)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "read_u8",
        |process: Process, address: i64| -> Result<i64, Box<EvalAltResult>> {
            memory::read_u8(&process, address as u64)
                .map(i64::from)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "read_u16",
        |process: Process, address: i64| -> Result<i64, Box<EvalAltResult>> {
            memory::read_u16(&process, address as u64)
                .map(i64::from)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "read_u32",
        |process: Process, address: i64| -> Result<i64, Box<EvalAltResult>> {
            memory::read_u32(&process, address as u64)
                .map(i64::from)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "read_u64",
        |process: Process, address: i64| -> Result<i64, Box<EvalAltResult>> {
            memory::read_u64(&process, address as u64)
                .map(|v| v as i64)
                .map_err(bridge_err)
        },
    );
    engine.register_fn(
        "write_u8",
        |process: Process, address: i64, value: i64| -> Result<(), Box<EvalAltResult>> {
            memory::write_u8(&process, address as u64, value as u8).map_err(bridge_err)
        },
    );
    engine.register_fn(
        "write_u16",
        |process: Process, address: i64, value: i64| -> Result<(), Box<EvalAltResult>> {
            memory::write_u16(&process, address as u64, value as u16).map_err(bridge_err)
        },
    );
    engine.register_fn(
        "write_u32",
        |process: Process, address: i64, value: i64| -> Result<(), Box<EvalAltResult>> {
            memory::write_u32(&process, address as u64, value as u32).map_err(bridge_err)
        },
    );
    engine.register_fn(
        "write_u64",
        |process: Process, address: i64, value: i64| -> Result<(), Box<EvalAltResult>> {
            memory::write_u64(&process, address as u64, value as u64).map_err(bridge_err)
        },
    );
    engine.register_fn(
        "search_memory",
        |process: Process, start: i64, size: i64, pattern: Blob| -> Result<Array, Box<EvalAltResult>> {
            memory::search_memory(&process, start as u64, size as usize, &pattern)
                .map(|hits| hits.into_iter().map(|a| Dynamic::from(a as i64)).collect())
                .map_err(bridge_err)
        },
    );
}

fn register_helpers(engine: &mut Engine) {
    engine.register_fn("hex", |value: i64| format!("{value:#x}"));
    engine.register_fn("to_hex", |blob: Blob| {
        blob.iter().map(|b| format!("{b:02x}")).collect::<String>()
    });
    engine.register_fn(
        "from_hex",
        |text: &str| -> Result<Blob, Box<EvalAltResult>> {
            let text = text.trim().trim_start_matches("0x");
            if text.len() % 2 != 0 {
                return Err(msg_err("from_hex: odd-length hex string"));
            }
            (0..text.len())
                .step_by(2)
                .map(|i| {
                    u8::from_str_radix(&text[i..i + 2], 16)
                        .map_err(|e| msg_err(format!("from_hex: {e}")))
                })
                .collect()
        },
    );
    engine.register_fn(
        "to_json",
        |value: Dynamic| -> Result<String, Box<EvalAltResult>> {
            serde_json::to_string(&value).map_err(|e| msg_err(format!("to_json: {e}")))
        },
    );
    engine.register_fn(
        "parse_json",
        |text: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|e| msg_err(format!("parse_json: {e}")))?;
            rhai::serde::to_dynamic(value).map_err(|e| msg_err(format!("parse_json: {e}")))
        },
    );
    engine.register_fn(
        "regex_match",
        |pattern: &str, text: &str| -> Result<bool, Box<EvalAltResult>> {
            regex::Regex::new(pattern)
                .map(|re| re.is_match(text))
                .map_err(|e| msg_err(format!("regex_match: {e}")))
        },
    );
    engine.register_fn(
        "regex_find_all",
        |pattern: &str, text: &str| -> Result<Array, Box<EvalAltResult>> {
            let re =
                regex::Regex::new(pattern).map_err(|e| msg_err(format!("regex_find_all: {e}")))?;
            Ok(re
                .find_iter(text)
                .map(|m| Dynamic::from(m.as_str().to_string()))
                .collect())
        },
    );
}

fn symbol_hits_to_array(hits: Vec<wyrm_bridge::SymbolHit>) -> Array {
    hits.into_iter()
        .map(|hit| {
            let mut map = Map::new();
            map.insert("name".into(), hit.name.into());
            map.insert("address".into(), (hit.address as i64).into());
            map.insert("module".into(), hit.module.into());
            Dynamic::from(map)
        })
        .collect()
}

fn variable_to_map(node: &VariableNode) -> Map {
    let mut map = Map::new();
    map.insert("name".into(), node.name.clone().into());
    map.insert("type".into(), node.type_name.clone().into());
    map.insert("value".into(), node.value.clone().into());
    map.insert(
        "address".into(),
        node.address
            .map(|a| Dynamic::from(a as i64))
            .unwrap_or(Dynamic::UNIT),
    );
    map.insert(
        "children".into(),
        Dynamic::from(
            node.children
                .iter()
                .map(|child| Dynamic::from(variable_to_map(child)))
                .collect::<Array>(),
        ),
    );
    map
}
