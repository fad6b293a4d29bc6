//! Shared fixtures for runtime integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use udf_bytecode::{access, BytecodeWriter, ClassFile, MethodDef, Opcode};

static INIT: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// `int add(int, int)`, `long add(long, long)`, `int div(int, int)` (non-public)
/// and `double scale(double)`
pub fn math_class(name: &str) -> ClassFile {
    let mut class = ClassFile::new(name);

    let mut writer = BytecodeWriter::new();
    writer.emit_load_local_0();
    writer.emit_load_local_1();
    writer.emit_iadd();
    writer.emit_return();
    class.add_method(MethodDef::new("add", ["int", "int"], "int").with_code(writer.into_bytes()));

    let mut writer = BytecodeWriter::new();
    writer.emit_load_local_0();
    writer.emit_load_local_1();
    writer.emit_ladd();
    writer.emit_return();
    class.add_method(MethodDef::new("add", ["long", "long"], "long").with_code(writer.into_bytes()));

    let mut writer = BytecodeWriter::new();
    writer.emit_load_local_0();
    writer.emit_load_local_1();
    writer.emit_idiv();
    writer.emit_return();
    class.add_method(
        MethodDef::new("div", ["int", "int"], "int")
            .with_access(access::STATIC)
            .with_code(writer.into_bytes()),
    );

    let mut writer = BytecodeWriter::new();
    writer.emit_load_local_0();
    writer.emit_const_f64(1.5);
    writer.emit_fmul();
    writer.emit_return();
    class.add_method(MethodDef::new("scale", ["double"], "double").with_code(writer.into_bytes()));

    class
}

/// `int forever(int)`: unbounded self recursion
pub fn recursive_class(name: &str) -> ClassFile {
    let mut writer = BytecodeWriter::new();
    writer.emit_load_local_0();
    writer.emit_call_static(0, 1);
    writer.emit_return();

    let mut class = ClassFile::new(name);
    class.add_method(MethodDef::new("forever", ["int"], "int").with_code(writer.into_bytes()));
    class
}

/// A class whose only method falls off the end of its code
pub fn unverifiable_class(name: &str) -> ClassFile {
    let mut class = ClassFile::new(name);
    class.add_method(
        MethodDef::new("broken", ["int"], "int").with_code(vec![Opcode::LoadLocal0 as u8]),
    );
    class
}

/// A class whose only method declares `u32::MAX` local slots
pub fn oversized_locals_class(name: &str) -> ClassFile {
    let mut method = MethodDef::new("wide", Vec::<String>::new(), "int")
        .with_code(vec![Opcode::ConstI32 as u8, 1, 0, 0, 0, Opcode::Return as u8]);
    method.local_count = u32::MAX as usize;

    let mut class = ClassFile::new(name);
    class.add_method(method);
    class
}

/// Write `class` to `<dir>/<file_stem>.udfc`
pub fn write_class(dir: &Path, file_stem: &str, class: &ClassFile) {
    std::fs::write(dir.join(format!("{}.udfc", file_stem)), class.encode())
        .expect("Failed to write class file");
}
