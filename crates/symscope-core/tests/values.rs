//! Tests for symbolic values: navigation, casts, conversions and equality

mod common;

use common::*;
use symscope_core::config::SessionConfig;
use symscope_core::descriptor::TypeKind;
use symscope_core::error::SymscopeError;
use symscope_core::types::Address;
use symscope_core::value::UNTRACKED_PATH;

#[test]
fn test_global_pointer_dereference_and_fields()
{
    let (_, process) = native_process();

    let base_ptr = process.global("app!g_base_ptr").unwrap();
    assert_eq!(base_ptr.name(), "g_base_ptr");
    assert_eq!(base_ptr.memory_address(), Address::from(G_BASE_PTR));
    assert_eq!(base_ptr.pointer_address().unwrap(), Address::from(DERIVED_OBJECT));
    assert!(!base_ptr.is_null_pointer().unwrap());

    // Fields are reachable through the pointer without dereferencing.
    assert_eq!(base_ptr.field("x").unwrap().to_i32().unwrap(), 1);

    let base = base_ptr.dereference().unwrap();
    assert_eq!(&*base.ty().name().unwrap(), "Base");
    assert_eq!(base.memory_address(), Address::from(DERIVED_OBJECT));
    assert_eq!(base.field("y").unwrap().to_i32().unwrap(), 2);
}

#[test]
fn test_global_lookup_errors()
{
    let (_, process) = native_process();

    assert!(matches!(process.global("g_missing"), Err(SymscopeError::GlobalNotFound(_))));
    assert!(matches!(process.global("lib!g_count"), Err(SymscopeError::GlobalNotFound(_))));
    assert!(process.global("g_count").is_ok());
}

#[test]
fn test_fields_inherited_from_base()
{
    let (_, process) = native_process();

    let derived = process.global("g_derived").unwrap();
    assert_eq!(derived.field("x").unwrap().to_i32().unwrap(), 1);
    assert_eq!(derived.field("z").unwrap().to_i32().unwrap(), 3);
    assert_eq!(derived.class_field("z").unwrap().to_i32().unwrap(), 3);
    assert!(matches!(derived.class_field("x"), Err(SymscopeError::FieldNotFound { .. })));

    let values: Vec<i32> = derived.fields().unwrap().iter().map(|field| field.to_i32().unwrap()).collect();
    assert_eq!(values, [3, 1, 2]);
}

#[test]
fn test_base_class_sub_objects()
{
    let (_, process) = native_process();

    let derived = process.global("g_derived").unwrap();
    let base = derived.base_class().unwrap();
    assert_eq!(&*base.ty().name().unwrap(), "Base");
    assert_eq!(base.memory_address(), Address::from(DERIVED_OBJECT));
    assert_eq!(base.field("y").unwrap().to_i32().unwrap(), 2);

    let named = derived.base_class_named("BASE").unwrap();
    assert_eq!(named.ty(), base.ty());
}

#[test]
fn test_base_first_sub_object_addresses()
{
    let (_, process) = native_process();

    let derived = process.global("g_plain").unwrap();
    assert_eq!(derived.field("x").unwrap().memory_address(), Address::from(PLAIN_OBJECT));
    let z = derived.field("z").unwrap();
    assert_eq!(z.memory_address(), Address::from(PLAIN_OBJECT + 8));
    assert_eq!(z.to_i32().unwrap(), 30);

    let base = derived.base_class().unwrap();
    assert_eq!(base.memory_address(), Address::from(PLAIN_OBJECT));
    let y = base.field("y").unwrap();
    assert_eq!(y.memory_address(), Address::from(PLAIN_OBJECT + 4));
    assert_eq!(y.to_i32().unwrap(), 20);
}

#[test]
fn test_virtual_base_resolved_per_instance()
{
    let (_, process) = native_process();

    let diamond = process.global("g_diamond").unwrap();
    assert_eq!(diamond.field("d").unwrap().to_i32().unwrap(), 7);
    assert_eq!(diamond.field("x").unwrap().to_i32().unwrap(), 5);
    assert_eq!(diamond.field("v").unwrap().to_i32().unwrap(), 9);

    let vbase = diamond.base_class_at(0).unwrap();
    assert_eq!(&*vbase.ty().name().unwrap(), "VBase");
    assert_eq!(vbase.memory_address(), Address::from(DIAMOND_OBJECT + 32));

    let base = diamond.base_class_at(1).unwrap();
    assert_eq!(base.field("y").unwrap().to_i32().unwrap(), 6);

    assert!(matches!(
        diamond.base_class_at(2),
        Err(SymscopeError::BaseClassIndexOutOfRange { index: 2, count: 2, .. })
    ));
    assert!(matches!(diamond.base_class(), Err(SymscopeError::MultipleBaseClasses { .. })));
}

#[test]
fn test_virtual_base_through_pointer()
{
    let (_, process) = native_process();

    let diamond = process.global("g_diamond").unwrap();
    let pointer = diamond.address_of().unwrap();
    assert!(pointer.ty().is_pointer());
    assert_eq!(pointer.field("v").unwrap().to_i32().unwrap(), 9);
    let vbase = pointer.base_class_named("VBase").unwrap();
    assert!(vbase.ty().is_pointer());
    assert_eq!(vbase.pointer_address().unwrap(), Address::from(DIAMOND_OBJECT + 32));
}

#[test]
fn test_array_indexing()
{
    let (_, process) = native_process();

    let numbers = process.global("g_numbers").unwrap();
    assert_eq!(numbers.array_length().unwrap(), 4);
    assert_eq!(numbers.array_element(0).unwrap().to_i32().unwrap(), 5);
    assert_eq!(numbers.array_element(3).unwrap().to_i32().unwrap(), 8);

    let count = process.global("g_count").unwrap();
    assert!(matches!(count.array_element(0), Err(SymscopeError::NotArrayOrPointer(_))));
    assert!(matches!(count.dereference(), Err(SymscopeError::NotPointer(_))));
    assert!(matches!(count.array_length(), Err(SymscopeError::NotArray(_))));
}

#[test]
fn test_pointer_indexing_uses_element_stride()
{
    let (_, process) = native_process();

    let name = process.global("g_name").unwrap();
    let second = name.array_element(1).unwrap();
    assert_eq!(second.memory_address(), Address::from(HELLO + 1));
    assert_eq!(second.to_u8().unwrap(), b'e');
}

#[test]
fn test_paths_follow_navigation()
{
    let (_, process) = native_process();

    let base_ptr = process.global("g_base_ptr").unwrap();
    assert_eq!(base_ptr.path(), "g_base_ptr");
    assert_eq!(base_ptr.field("x").unwrap().path(), "g_base_ptr.x");

    let numbers = process.global("g_numbers").unwrap();
    let element = numbers.array_element(2).unwrap();
    assert_eq!(element.path(), "g_numbers[2]");
    assert_eq!(element.name(), "<computed>");
}

#[test]
fn test_untracked_paths()
{
    let (_, process) = native_process_with(SessionConfig::default().with_track_paths(false));

    let base_ptr = process.global("g_base_ptr").unwrap();
    assert_eq!(base_ptr.field("x").unwrap().path(), UNTRACKED_PATH);
}

#[test]
fn test_integer_conversions()
{
    let (_, process) = native_process();

    let count = process.global("g_count").unwrap();
    assert_eq!(count.to_i32().unwrap(), -7);
    assert_eq!(count.to_i64().unwrap(), -7);
    assert_eq!(count.to_string(), "-7");
    assert!(matches!(count.to_u8(), Err(SymscopeError::ConversionFailed { .. })));
    assert!(count.to_bool().unwrap());

    let color = process.global("g_color").unwrap();
    assert_eq!(color.to_u32().unwrap(), 1);
    assert_eq!(color.to_string(), "Green");

    let base_ptr = process.global("g_base_ptr").unwrap();
    assert_eq!(base_ptr.to_u64().unwrap(), DERIVED_OBJECT);
}

#[test]
fn test_real_conversions()
{
    let (_, process) = native_process();

    let pi = process.global("g_pi").unwrap();
    assert!((pi.to_f64().unwrap() - 3.5).abs() < f64::EPSILON);
    assert_eq!(pi.to_string(), "3.5");
}

#[test]
fn test_string_rendering()
{
    let (_, process) = native_process();

    assert_eq!(process.global("g_name").unwrap().to_string(), "hello");
    assert_eq!(process.global("g_buffer").unwrap().to_string(), "abc");
    assert_eq!(process.global("g_wide").unwrap().to_string(), "hi");
    assert_eq!(process.global("g_null").unwrap().to_string(), "(null)");
}

#[test]
fn test_composite_rendering_falls_back_to_address()
{
    let (_, process) = native_process();

    let derived = process.global("g_derived").unwrap();
    assert_eq!(derived.to_string(), "0x0000000010000000 (Derived)");
}

#[test]
fn test_null_pointer()
{
    let (_, process) = native_process();

    let null = process.global("g_null").unwrap();
    assert!(null.is_null_pointer().unwrap());
    assert_eq!(null.runtime_type(), *null.ty());
    assert_eq!(null.runtime_offset(), 0);
}

#[test]
fn test_adjust_pointer()
{
    let (_, process) = native_process();

    let name = process.global("g_name").unwrap();
    let shifted = name.adjust_pointer(1).unwrap();
    assert_eq!(shifted.to_string(), "ello");
    assert_eq!(shifted.memory_address(), Address::ZERO);

    let count = process.global("g_count").unwrap();
    let moved = count.adjust_pointer(-4).unwrap();
    assert_eq!(moved.memory_address(), Address::from(G_COUNT - 4));

    let int = process.type_by_name("int").unwrap();
    assert!(matches!(
        process.constant(&int, 1).adjust_pointer(4),
        Err(SymscopeError::NotPointer(_))
    ));
}

#[test]
fn test_cast_rules()
{
    let (_, process) = native_process();

    let base_ptr_type = process.type_by_name("Base*").unwrap();
    let derived_type = process.type_by_name("Derived").unwrap();

    // Value to pointer: the storage address becomes the data word.
    let derived = process.global("g_derived").unwrap();
    let as_pointer = derived.cast_as(&base_ptr_type).unwrap();
    assert_eq!(as_pointer.pointer_address().unwrap(), Address::from(DERIVED_OBJECT));
    assert_eq!(as_pointer.field("x").unwrap().to_i32().unwrap(), 1);

    // Pointer to value: the value the pointer points at.
    let base_ptr = process.global("g_base_ptr").unwrap();
    let pointee = base_ptr.cast_as(&derived_type).unwrap();
    assert_eq!(pointee.memory_address(), Address::from(DERIVED_OBJECT));
    assert_eq!(pointee.field("z").unwrap().to_i32().unwrap(), 3);

    // Pointer to pointer keeps the data word.
    let derived_ptr_type = derived_type.pointer_to_type().unwrap();
    let repointed = base_ptr.cast_as(&derived_ptr_type).unwrap();
    assert_eq!(repointed.pointer_address().unwrap(), Address::from(DERIVED_OBJECT));
    assert_eq!(repointed.field("z").unwrap().to_i32().unwrap(), 3);

    // Same type is the identity.
    let same = base_ptr.cast_as(base_ptr.ty()).unwrap();
    assert_eq!(same.path(), base_ptr.path());
}

#[test]
fn test_cast_round_trips()
{
    let (_, process) = native_process();

    let derived_type = process.type_by_name("Derived").unwrap();
    let derived_ptr_type = derived_type.pointer_to_type().unwrap();
    let derived = process.global("g_derived").unwrap();

    // Casting to the value's own type keeps address and content.
    let same = derived.cast_as(&derived_type).unwrap();
    assert_eq!(same.memory_address(), derived.memory_address());
    assert_eq!(same, derived);

    // Through the pointer type and back.
    let pointer = derived.cast_as(&derived_ptr_type).unwrap();
    assert_eq!(pointer.pointer_address().unwrap(), Address::from(DERIVED_OBJECT));
    let back = pointer.cast_as(&derived_type).unwrap();
    assert_eq!(back.ty(), derived.ty());
    assert_eq!(back.memory_address(), Address::from(DERIVED_OBJECT));
    assert_eq!(back, derived);
    for name in ["x", "y", "z"] {
        assert_eq!(
            back.field(name).unwrap().to_i32().unwrap(),
            derived.field(name).unwrap().to_i32().unwrap()
        );
    }
}

#[test]
fn test_value_to_value_cast_reinterprets_in_place()
{
    let (_, process) = native_process();

    let base_type = process.type_by_name("Base").unwrap();
    let derived = process.global("g_derived").unwrap();

    let base = derived.cast_as(&base_type).unwrap();
    assert_eq!(base.ty(), &base_type);
    assert_eq!(base.memory_address(), derived.memory_address());
    assert_eq!(base.path(), derived.path());
    assert_eq!(base.field("y").unwrap().memory_address(), Address::from(DERIVED_OBJECT + 12));
    assert_eq!(base.field("y").unwrap().to_i32().unwrap(), 2);
    assert!(matches!(base.field("z"), Err(SymscopeError::FieldNotFound { .. })));
}

#[test]
fn test_cast_without_storage_fails()
{
    let (_, process) = native_process();

    let int = process.type_by_name("int").unwrap();
    let double = process.type_by_name("double").unwrap();
    let constant = process.constant(&int, 5);
    assert_eq!(constant.to_i32().unwrap(), 5);
    assert!(matches!(
        constant.cast_as(&double),
        Err(SymscopeError::NullAddressCast { .. })
    ));
    assert!(matches!(constant.address_of(), Err(SymscopeError::NullAddressCast { .. })));
}

#[test]
fn test_cast_as_name()
{
    let (_, process) = native_process();

    let base_ptr = process.global("g_base_ptr").unwrap();
    let derived_ptr = base_ptr.cast_as_name("Derived*").unwrap();
    assert_eq!(derived_ptr.ty().kind(), TypeKind::SyntheticPointer);
    assert_eq!(derived_ptr.field("z").unwrap().to_i32().unwrap(), 3);

    let qualified = base_ptr.cast_as_name("app!Derived").unwrap();
    assert_eq!(qualified.field("z").unwrap().to_i32().unwrap(), 3);

    assert!(matches!(base_ptr.cast_as_name("Nope"), Err(SymscopeError::TypeNotFound { .. })));
}

#[test]
fn test_address_of_round_trip()
{
    let (_, process) = native_process();

    let count = process.global("g_count").unwrap();
    let pointer = count.address_of().unwrap();
    assert_eq!(&*pointer.ty().name().unwrap(), "int*");
    assert_eq!(pointer.pointer_address().unwrap(), Address::from(G_COUNT));
    assert_eq!(pointer.dereference().unwrap().to_i32().unwrap(), -7);
}

#[test]
fn test_equality()
{
    let (_, process) = native_process();

    let base_ptr = process.global("g_base_ptr").unwrap();
    let derived = process.global("g_derived").unwrap();
    let base_ptr_type = process.type_by_name("Base*").unwrap();

    // Same pointer type, same pointee address.
    assert_eq!(base_ptr, derived.cast_as(&base_ptr_type).unwrap());
    // A pointer equals the value it points at.
    assert_eq!(base_ptr, base_ptr.dereference().unwrap());
    // Unrelated non-pointer types at the same address differ.
    assert_ne!(derived, base_ptr.dereference().unwrap());

    let null = process.global("g_null").unwrap();
    let other_null = process.pointer_value(&base_ptr_type, Address::ZERO).unwrap();
    assert_eq!(null, other_null);
    assert_ne!(null, base_ptr);
}

#[test]
fn test_equality_is_reflexive_for_unreadable_values()
{
    let (target, process) = native_process();

    let base_ptr_type = process.type_by_name("Base*").unwrap();
    let dangling = process.value(&base_ptr_type, Address::from(0xdead_0000));
    assert!(dangling.pointer_address().is_err());

    let reads = CallCounts::get(&target.calls.read_memory);
    assert_eq!(dangling, dangling.clone());
    assert_eq!(dangling, process.value(&base_ptr_type, Address::from(0xdead_0000)));
    assert!(dangling.equals(&dangling).unwrap());
    assert_eq!(CallCounts::get(&target.calls.read_memory), reads);

    // A different storage address has to be read, which fails.
    let elsewhere = process.value(&base_ptr_type, Address::from(0xdead_0008));
    assert_ne!(dangling, elsewhere);
    assert!(dangling.equals(&elsewhere).is_err());
}

#[test]
fn test_pointer_value_requires_pointer_type()
{
    let (_, process) = native_process();

    let int = process.type_by_name("int").unwrap();
    assert!(matches!(
        process.pointer_value(&int, Address::from(G_COUNT)),
        Err(SymscopeError::NotPointer(_))
    ));
}

#[test]
fn test_untyped_pointer_value()
{
    let (_, process) = native_process();

    let raw = process.untyped_pointer(Address::from(HEAP)).unwrap();
    assert_eq!(raw.ty().kind(), TypeKind::UntypedPointer);
    assert_eq!(raw.pointer_address().unwrap(), Address::from(HEAP));
    assert_eq!(raw.ty().module_id(), APP);

    let base_ptr_type = process.type_by_name("Base*").unwrap();
    let typed = raw.cast_as(&base_ptr_type).unwrap();
    assert_eq!(typed.field("x").unwrap().to_i32().unwrap(), 1);

    // The untyped pointer has no pointee to compare with.
    assert_ne!(raw, typed.dereference().unwrap());
}

#[test]
fn test_unreadable_memory_is_an_environment_error()
{
    let (_, process) = native_process();

    let int = process.type_by_name("int").unwrap();
    let value = process.value(&int, Address::from(0xdead_0000));
    let error = value.to_i32().unwrap_err();
    assert!(matches!(error, SymscopeError::MemoryReadFailed { .. }));
    assert!(error.is_environment());
    assert!(value.to_string().starts_with('<'));
}

#[test]
fn test_unsupported_data_size()
{
    let (_, process) = native_process();

    let derived = process.type_by_name("Derived").unwrap();
    let value = process.value(&derived, Address::from(DERIVED_OBJECT));
    assert!(matches!(value.data(), Err(SymscopeError::UnsupportedDataSize(24))));
}
