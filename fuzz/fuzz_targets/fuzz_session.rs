#![no_main]

use blockflow::{Program, Session, StepResult};
use libfuzzer_sys::fuzz_target;

const MAX_STEPS: u64 = 100_000;

fuzz_target!(|data: &[u8]| {
    // Only process valid UTF-8
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 10_000 {
        return;
    }

    let Ok(program) = Program::from_json(source) else {
        return;
    };
    let Ok(mut session) = Session::new(program) else {
        return;
    };
    session.set_max_steps(Some(MAX_STEPS));

    loop {
        match session.step() {
            Ok(StepResult::Continue) => {}
            Ok(StepResult::Done) | Ok(StepResult::Halted) => break,
            Err(_) => break, // Errors are expected
        }
    }
});
