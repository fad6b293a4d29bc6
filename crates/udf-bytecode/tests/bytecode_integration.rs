//! Integration tests for the class file format

use udf_bytecode::{
    access, verify_class, BytecodeWriter, ClassError, ClassFile, MethodDef, Opcode, VerifyError,
};

fn add_method() -> MethodDef {
    MethodDef::new("add", ["int", "int"], "int").with_code(vec![
        Opcode::LoadLocal0 as u8,
        Opcode::LoadLocal1 as u8,
        Opcode::Iadd as u8,
        Opcode::Return as u8,
    ])
}

#[test]
fn test_create_and_encode_class() {
    let mut class = ClassFile::new("Adder");
    class.add_method(add_method());

    let bytes = class.encode();
    assert_eq!(&bytes[..4], b"UDFC");
    assert!(bytes.len() > 16);
}

#[test]
fn test_decode_class() {
    let mut class = ClassFile::new("Adder");
    class.add_method(add_method());

    let bytes = class.encode();
    let decoded = ClassFile::decode(&bytes).expect("Failed to decode");

    assert_eq!(decoded.name, "Adder");
    assert_eq!(decoded.methods.len(), 1);
    assert_eq!(decoded.methods[0].name, "add");
    verify_class(&decoded).expect("Should be valid");
}

#[test]
fn test_overloads_survive_encoding() {
    let mut writer = BytecodeWriter::new();
    writer.emit_load_local_0();
    writer.emit_load_local_1();
    writer.emit_ladd();
    writer.emit_return();

    let mut class = ClassFile::new("Adder");
    class.add_method(add_method());
    class.add_method(MethodDef::new("add", ["long", "long"], "long").with_code(writer.into_bytes()));

    let decoded = ClassFile::decode(&class.encode()).unwrap();
    verify_class(&decoded).expect("Should be valid");
    assert_eq!(decoded.methods[1].param_types, vec!["long", "long"]);
}

#[test]
fn test_private_method_flags() {
    let mut class = ClassFile::new("Hidden");
    class.add_method(add_method().with_access(access::STATIC));

    let decoded = ClassFile::decode(&class.encode()).unwrap();
    assert!(!decoded.methods[0].is_public());
    assert!(decoded.methods[0].is_static());
}

#[test]
fn test_class_with_constants() {
    let mut class = ClassFile::new("Greeter");
    let greeting = class.constants.add_string("Hello, ");
    let big = class.constants.add_integer(10_000_000_000);

    let mut writer = BytecodeWriter::new();
    writer.emit_const_str(greeting);
    writer.emit_load_local_0();
    writer.emit_opcode(Opcode::Sconcat);
    writer.emit_return();
    class.add_method(
        MethodDef::new("greet", ["java.lang.String"], "java.lang.String")
            .with_code(writer.into_bytes()),
    );

    let mut writer = BytecodeWriter::new();
    writer.emit_const_i64(big);
    writer.emit_return();
    class.add_method(MethodDef::new("big", Vec::<String>::new(), "long").with_code(writer.into_bytes()));

    let decoded = ClassFile::decode(&class.encode()).unwrap();
    verify_class(&decoded).expect("Should be valid");
    assert_eq!(decoded.constants.get_string(greeting), Some("Hello, "));
    assert_eq!(decoded.constants.get_integer(big), Some(10_000_000_000));
}

#[test]
fn test_verify_rejects_no_return() {
    let mut class = ClassFile::new("Bad");
    class.add_method(MethodDef::new("bad", Vec::<String>::new(), "int").with_code(vec![
        Opcode::ConstI32 as u8,
        42,
        0,
        0,
        0,
        Opcode::Pop as u8,
    ]));

    assert!(matches!(
        verify_class(&class),
        Err(VerifyError::InMethod { .. })
    ));
}

#[test]
fn test_corrupted_payload() {
    let mut class = ClassFile::new("Adder");
    class.add_method(add_method());
    let mut bytes = class.encode();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    assert!(matches!(
        ClassFile::decode(&bytes),
        Err(ClassError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_truncated_file() {
    let mut class = ClassFile::new("Adder");
    class.add_method(add_method());
    let bytes = class.encode();

    for len in [0, 3, 15] {
        assert!(ClassFile::decode(&bytes[..len]).is_err());
    }
}

#[test]
fn test_many_methods() {
    let mut class = ClassFile::new("Many");

    for i in 0..50 {
        let mut writer = BytecodeWriter::new();
        writer.emit_const_i32(i);
        writer.emit_return();
        class.add_method(
            MethodDef::new(format!("fn_{}", i), Vec::<String>::new(), "int")
                .with_code(writer.into_bytes()),
        );
    }

    let decoded = ClassFile::decode(&class.encode()).unwrap();
    assert_eq!(decoded.methods.len(), 50);
    assert_eq!(decoded.methods[49].name, "fn_49");
    verify_class(&decoded).expect("Should be valid");
}
