#![no_main]

use blockflow::{Command, Compiler, Program};
use libfuzzer_sys::fuzz_target;

/// Command names the fuzzer draws from, one byte per command
const NAMES: &[&str] = &[
    "if", "elseIf", "else", "endIf", "while", "endWhile", "for", "endFor", "foreach", "endForeach",
    "try", "catch", "finally", "endTry", "continue", "break", "function", "endFunction", "return",
    "call", "label", "goto", "skipNext", "echo",
];

fuzz_target!(|data: &[u8]| {
    if data.len() > 512 {
        return;
    }
    let program: Program = data
        .iter()
        .enumerate()
        .map(|(i, byte)| {
            let name = NAMES[*byte as usize % NAMES.len()];
            Command::new(name, format!("f{}", i), "")
        })
        .collect();

    // Compilation either links every block or reports one error
    let _ = Compiler::compile_program(&program);
});
