//! In-memory fake target shared by the integration tests
//!
//! Two native modules (`app` and `lib`) with a small class hierarchy, a
//! managed runtime with a linked list and an array, and a sparse memory
//! image. Provider calls are counted so tests can check memoization.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use symscope_core::config::SessionConfig;
use symscope_core::descriptor::{BuiltinType, MemberOffset, TypeTag};
use symscope_core::error::{SymscopeError, SymscopeResult};
use symscope_core::managed::{ElementKind, ManagedField, ManagedRuntime, ManagedTypeInfo};
use symscope_core::process::Process;
use symscope_core::provider::{GlobalVariable, ModuleInfo, NativeBaseClass, NativeField, RuntimeTypeInfo, SymbolProvider};
use symscope_core::types::{Address, Architecture, ManagedTypeHandle, MemoryRegion, MemoryRegionId, ModuleId, NativeTypeId};

pub const APP: ModuleId = ModuleId(1);
pub const LIB: ModuleId = ModuleId(2);

pub const INT: NativeTypeId = NativeTypeId(1);
pub const CHAR: NativeTypeId = NativeTypeId(2);
pub const BASE: NativeTypeId = NativeTypeId(3);
pub const DERIVED: NativeTypeId = NativeTypeId(4);
pub const BASE_PTR: NativeTypeId = NativeTypeId(5);
pub const CHAR_PTR: NativeTypeId = NativeTypeId(6);
pub const CHAR_ARRAY: NativeTypeId = NativeTypeId(7);
pub const COLOR: NativeTypeId = NativeTypeId(8);
pub const DOUBLE: NativeTypeId = NativeTypeId(9);
pub const VBASE: NativeTypeId = NativeTypeId(10);
pub const DIAMOND: NativeTypeId = NativeTypeId(11);
pub const PAIR: NativeTypeId = NativeTypeId(12);
pub const FIXED_ARRAY: NativeTypeId = NativeTypeId(13);
pub const SHARED: NativeTypeId = NativeTypeId(14);
pub const MIXED: NativeTypeId = NativeTypeId(15);
pub const WCHAR: NativeTypeId = NativeTypeId(16);
pub const WCHAR_PTR: NativeTypeId = NativeTypeId(17);
pub const INT_ARRAY: NativeTypeId = NativeTypeId(18);
pub const PLAIN_BASE: NativeTypeId = NativeTypeId(19);
pub const PLAIN_DERIVED: NativeTypeId = NativeTypeId(20);

pub const HEAP: u64 = 0x1000_0000;
pub const DERIVED_OBJECT: u64 = HEAP;
pub const HELLO: u64 = HEAP + 0x100;
pub const DIAMOND_OBJECT: u64 = HEAP + 0x200;
pub const WIDE_HI: u64 = HEAP + 0x300;
pub const MAGIC_FIRST: u64 = HEAP + 0x400;
pub const OFFSET_OBJECT: u64 = HEAP + 0x500;
pub const MAGIC_SECOND: u64 = HEAP + 0x800;

pub const NODE_OBJECT: u64 = HEAP + 0x600;
pub const LEAF_OBJECT: u64 = HEAP + 0x700;
pub const INT_ARRAY_OBJECT: u64 = HEAP + 0x900;
pub const NODE_SLOT: u64 = HEAP + 0xA00;
pub const ARRAY_SLOT: u64 = HEAP + 0xA08;
pub const POINT_VALUE: u64 = HEAP + 0xA10;
pub const PLAIN_OBJECT: u64 = HEAP + 0xB00;

pub const DERIVED_VTABLE: u64 = 0x40_1000;
pub const DIAMOND_VTABLE: u64 = 0x40_1010;
pub const DERIVED_SECOND_VTABLE: u64 = 0x40_1020;

pub const G_BASE_PTR: u64 = 0x40_2000;
pub const G_NAME: u64 = 0x40_2008;
pub const G_BUFFER: u64 = 0x40_2010;
pub const G_COLOR: u64 = 0x40_2020;
pub const G_PI: u64 = 0x40_2028;
pub const G_NULL: u64 = 0x40_2030;
pub const G_COUNT: u64 = 0x40_2038;
pub const G_WIDE: u64 = 0x40_2040;
pub const G_NUMBERS: u64 = 0x40_2048;

pub const THUNK: u64 = 0x40_3000;
pub const THUNK_TARGET: u64 = 0x40_3100;
pub const PLAIN_FUNCTION: u64 = 0x40_3020;

pub const OBJECT: ManagedTypeHandle = ManagedTypeHandle(100);
pub const INT32: ManagedTypeHandle = ManagedTypeHandle(101);
pub const POINT: ManagedTypeHandle = ManagedTypeHandle(102);
pub const NODE: ManagedTypeHandle = ManagedTypeHandle(103);
pub const INT32_ARRAY: ManagedTypeHandle = ManagedTypeHandle(104);
pub const LEAF: ManagedTypeHandle = ManagedTypeHandle(105);

/// Counters of provider round-trips
#[derive(Debug, Default)]
pub struct CallCounts
{
    pub type_name: AtomicUsize,
    pub type_size: AtomicUsize,
    pub type_fields: AtomicUsize,
    pub base_classes: AtomicUsize,
    pub read_memory: AtomicUsize,
    pub runtime_type: AtomicUsize,
    pub memory_regions: AtomicUsize,
    pub managed_type_info: AtomicUsize,
}

impl CallCounts
{
    pub fn get(counter: &AtomicUsize) -> usize
    {
        counter.load(Ordering::SeqCst)
    }
}

struct NativeRecord
{
    name: &'static str,
    tag: TypeTag,
    builtin: BuiltinType,
    size: u64,
    element: Option<NativeTypeId>,
    fields: Vec<NativeField>,
    bases: Vec<NativeBaseClass>,
}

impl NativeRecord
{
    fn new(name: &'static str, tag: TypeTag, size: u64) -> Self
    {
        Self {
            name,
            tag,
            builtin: BuiltinType::None,
            size,
            element: None,
            fields: Vec::new(),
            bases: Vec::new(),
        }
    }

    fn builtin(name: &'static str, builtin: BuiltinType, size: u64) -> Self
    {
        Self {
            builtin,
            ..Self::new(name, TypeTag::Builtin, size)
        }
    }

    fn element(mut self, element: NativeTypeId) -> Self
    {
        self.element = Some(element);
        self
    }

    fn field(mut self, name: &str, type_id: NativeTypeId, offset: u64) -> Self
    {
        self.fields.push(NativeField {
            name: name.to_string(),
            type_id,
            offset,
        });
        self
    }

    fn base(mut self, type_id: NativeTypeId, offset: MemberOffset) -> Self
    {
        self.bases.push(NativeBaseClass { type_id, offset });
        self
    }
}

/// Fake symbol provider and managed runtime over a sparse memory image
pub struct FakeTarget
{
    pub calls: CallCounts,
    architecture: Architecture,
    segments: RwLock<Vec<(u64, Vec<u8>, &'static str)>>,
    unbacked: RwLock<HashMap<u64, u64>>,
    types: HashMap<(ModuleId, NativeTypeId), NativeRecord>,
    globals: HashMap<&'static str, GlobalVariable>,
    managed: HashMap<ManagedTypeHandle, ManagedTypeInfo>,
    objects: HashMap<u64, ManagedTypeHandle>,
    arrays: HashMap<u64, u64>,
}

fn put(segment: &mut [u8], offset: u64, bytes: &[u8])
{
    let offset = usize::try_from(offset).unwrap();
    segment[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn managed_info(name: &str, kind: ElementKind) -> ManagedTypeInfo
{
    ManagedTypeInfo {
        name: name.to_string(),
        module: APP,
        element_kind: kind,
        base_type: None,
        component_type: None,
        is_array: false,
        is_enum: false,
        is_pointer: false,
        is_object_reference: false,
        is_primitive: false,
        is_value_class: false,
        has_simple_value: false,
        base_size: 0,
        element_size: 0,
        fields: Vec::new(),
    }
}

fn managed_field(name: &str, type_handle: ManagedTypeHandle, offset: u64) -> ManagedField
{
    ManagedField {
        name: name.to_string(),
        type_handle,
        offset,
    }
}

impl FakeTarget
{
    pub fn new() -> Self
    {
        let mut types = HashMap::new();
        let mut app = |id: NativeTypeId, record: NativeRecord| {
            types.insert((APP, id), record);
        };

        app(INT, NativeRecord::builtin("int", BuiltinType::Int32, 4));
        app(CHAR, NativeRecord::builtin("char", BuiltinType::Char8, 1));
        app(DOUBLE, NativeRecord::builtin("double", BuiltinType::Float64, 8));
        app(WCHAR, NativeRecord::builtin("wchar_t", BuiltinType::Char16, 2));
        app(
            BASE,
            NativeRecord::new("Base", TypeTag::Class, 16)
                .field("x", INT, 8)
                .field("y", INT, 12),
        );
        app(
            DERIVED,
            NativeRecord::new("Derived", TypeTag::Class, 24)
                .base(BASE, MemberOffset::Fixed(0))
                .field("z", INT, 16),
        );
        app(BASE_PTR, NativeRecord::new("Base*", TypeTag::Pointer, 8).element(BASE));
        app(CHAR_PTR, NativeRecord::new("char*", TypeTag::Pointer, 8).element(CHAR));
        app(WCHAR_PTR, NativeRecord::new("wchar_t*", TypeTag::Pointer, 8).element(WCHAR));
        app(CHAR_ARRAY, NativeRecord::new("char[16]", TypeTag::Array, 16).element(CHAR));
        app(INT_ARRAY, NativeRecord::new("int[4]", TypeTag::Array, 16).element(INT));
        app(COLOR, NativeRecord::new("Color", TypeTag::Enum, 4));
        app(VBASE, NativeRecord::new("VBase", TypeTag::Struct, 4).field("v", INT, 0));
        app(
            DIAMOND,
            NativeRecord::new("Diamond", TypeTag::Class, 40)
                .base(BASE, MemberOffset::Fixed(0))
                .base(VBASE, MemberOffset::VirtualBase)
                .field("d", INT, 16),
        );
        app(
            PAIR,
            NativeRecord::new("Pair<int, Pair<char, int> >", TypeTag::Struct, 8)
                .field("first", INT, 0)
                .field("second", CHAR, 4),
        );
        app(FIXED_ARRAY, NativeRecord::new("FixedArray<int,0x10,Unknown>", TypeTag::Struct, 64));
        app(SHARED, NativeRecord::new("Shared", TypeTag::Struct, 4));
        app(
            MIXED,
            NativeRecord::new("Mixed", TypeTag::Class, 24)
                .base(BASE, MemberOffset::Fixed(8))
                .base(VBASE, MemberOffset::Fixed(0)),
        );
        // Base-first layout without a vtable
        app(
            PLAIN_BASE,
            NativeRecord::new("PlainBase", TypeTag::Struct, 8)
                .field("x", INT, 0)
                .field("y", INT, 4),
        );
        app(
            PLAIN_DERIVED,
            NativeRecord::new("PlainDerived", TypeTag::Struct, 12)
                .base(PLAIN_BASE, MemberOffset::Fixed(0))
                .field("z", INT, 8),
        );
        types.insert((LIB, SHARED), NativeRecord::new("Shared", TypeTag::Struct, 4));

        let mut globals = HashMap::new();
        globals.insert("g_base_ptr", GlobalVariable { address: Address::from(G_BASE_PTR), type_id: BASE_PTR });
        globals.insert("g_name", GlobalVariable { address: Address::from(G_NAME), type_id: CHAR_PTR });
        globals.insert("g_buffer", GlobalVariable { address: Address::from(G_BUFFER), type_id: CHAR_ARRAY });
        globals.insert("g_color", GlobalVariable { address: Address::from(G_COLOR), type_id: COLOR });
        globals.insert("g_pi", GlobalVariable { address: Address::from(G_PI), type_id: DOUBLE });
        globals.insert("g_null", GlobalVariable { address: Address::from(G_NULL), type_id: BASE_PTR });
        globals.insert("g_count", GlobalVariable { address: Address::from(G_COUNT), type_id: INT });
        globals.insert("g_wide", GlobalVariable { address: Address::from(G_WIDE), type_id: WCHAR_PTR });
        globals.insert("g_numbers", GlobalVariable { address: Address::from(G_NUMBERS), type_id: INT_ARRAY });
        globals.insert("g_derived", GlobalVariable { address: Address::from(DERIVED_OBJECT), type_id: DERIVED });
        globals.insert("g_plain", GlobalVariable { address: Address::from(PLAIN_OBJECT), type_id: PLAIN_DERIVED });
        globals.insert("g_diamond", GlobalVariable { address: Address::from(DIAMOND_OBJECT), type_id: DIAMOND });

        let mut image = vec![0_u8; 0x4000];
        put(&mut image, G_BASE_PTR - 0x40_0000, &DERIVED_OBJECT.to_le_bytes());
        put(&mut image, G_NAME - 0x40_0000, &HELLO.to_le_bytes());
        put(&mut image, G_BUFFER - 0x40_0000, b"abc\0");
        put(&mut image, G_COLOR - 0x40_0000, &1_u32.to_le_bytes());
        put(&mut image, G_PI - 0x40_0000, &3.5_f64.to_bits().to_le_bytes());
        put(&mut image, G_COUNT - 0x40_0000, &(-7_i32).to_le_bytes());
        put(&mut image, G_WIDE - 0x40_0000, &WIDE_HI.to_le_bytes());
        for (i, number) in [5_i32, 6, 7, 8].iter().enumerate() {
            put(&mut image, G_NUMBERS - 0x40_0000 + 4 * i as u64, &number.to_le_bytes());
        }
        let displacement = i32::try_from(THUNK_TARGET - (THUNK + 5)).unwrap();
        put(&mut image, THUNK - 0x40_0000, &[0xE9]);
        put(&mut image, THUNK - 0x40_0000 + 1, &displacement.to_le_bytes());
        put(&mut image, PLAIN_FUNCTION - 0x40_0000, &[0x55, 0x48, 0x89, 0xE5, 0x90]);

        let mut heap = vec![0_u8; 0x1000];
        let at = |address: u64| address - HEAP;
        // Derived { vfptr, x = 1, y = 2, z = 3 }
        put(&mut heap, at(DERIVED_OBJECT), &DERIVED_VTABLE.to_le_bytes());
        put(&mut heap, at(DERIVED_OBJECT + 8), &1_i32.to_le_bytes());
        put(&mut heap, at(DERIVED_OBJECT + 12), &2_i32.to_le_bytes());
        put(&mut heap, at(DERIVED_OBJECT + 16), &3_i32.to_le_bytes());
        put(&mut heap, at(HELLO), b"hello\0");
        // Diamond { vfptr, x = 5, y = 6, d = 7, ..., VBase { v = 9 } at +32 }
        put(&mut heap, at(DIAMOND_OBJECT), &DIAMOND_VTABLE.to_le_bytes());
        put(&mut heap, at(DIAMOND_OBJECT + 8), &5_i32.to_le_bytes());
        put(&mut heap, at(DIAMOND_OBJECT + 12), &6_i32.to_le_bytes());
        put(&mut heap, at(DIAMOND_OBJECT + 16), &7_i32.to_le_bytes());
        put(&mut heap, at(DIAMOND_OBJECT + 32), &9_i32.to_le_bytes());
        put(&mut heap, at(WIDE_HI), &[b'h', 0, b'i', 0, 0, 0]);
        put(&mut heap, at(MAGIC_FIRST), b"MAGIC");
        put(&mut heap, at(MAGIC_SECOND), b"MAGIC");
        // A Derived whose second sub-object at +8 carries its own vtable
        put(&mut heap, at(OFFSET_OBJECT), &DERIVED_VTABLE.to_le_bytes());
        put(&mut heap, at(OFFSET_OBJECT + 8), &DERIVED_SECOND_VTABLE.to_le_bytes());

        // Node { Value = 42, Next = leaf, Items = int[] { 10, 20, 30 } }
        put(&mut heap, at(NODE_OBJECT + 8), &42_i32.to_le_bytes());
        put(&mut heap, at(NODE_OBJECT + 16), &LEAF_OBJECT.to_le_bytes());
        put(&mut heap, at(NODE_OBJECT + 24), &INT_ARRAY_OBJECT.to_le_bytes());
        // Leaf { Value = 7, Next = null, Items = null, Weight = 99 }
        put(&mut heap, at(LEAF_OBJECT + 8), &7_i32.to_le_bytes());
        put(&mut heap, at(LEAF_OBJECT + 32), &99_i32.to_le_bytes());
        // int[3] with a 16-byte header (method table, length)
        put(&mut heap, at(INT_ARRAY_OBJECT + 8), &3_u64.to_le_bytes());
        for (i, number) in [10_i32, 20, 30].iter().enumerate() {
            put(&mut heap, at(INT_ARRAY_OBJECT + 16) + 4 * i as u64, &number.to_le_bytes());
        }
        put(&mut heap, at(NODE_SLOT), &NODE_OBJECT.to_le_bytes());
        put(&mut heap, at(ARRAY_SLOT), &INT_ARRAY_OBJECT.to_le_bytes());
        put(&mut heap, at(POINT_VALUE), &3_i32.to_le_bytes());
        put(&mut heap, at(POINT_VALUE + 4), &4_i32.to_le_bytes());
        // PlainDerived { x = 10, y = 20, z = 30 }
        put(&mut heap, at(PLAIN_OBJECT), &10_i32.to_le_bytes());
        put(&mut heap, at(PLAIN_OBJECT + 4), &20_i32.to_le_bytes());
        put(&mut heap, at(PLAIN_OBJECT + 8), &30_i32.to_le_bytes());

        let mut managed = HashMap::new();
        managed.insert(
            OBJECT,
            ManagedTypeInfo {
                is_object_reference: true,
                base_size: 8,
                ..managed_info("System.Object", ElementKind::Object)
            },
        );
        managed.insert(
            INT32,
            ManagedTypeInfo {
                is_primitive: true,
                is_value_class: true,
                has_simple_value: true,
                base_size: 4,
                ..managed_info("System.Int32", ElementKind::Int32)
            },
        );
        managed.insert(
            POINT,
            ManagedTypeInfo {
                is_value_class: true,
                base_size: 8,
                fields: vec![managed_field("X", INT32, 0), managed_field("Y", INT32, 4)],
                ..managed_info("Sample.Point", ElementKind::Struct)
            },
        );
        managed.insert(
            NODE,
            ManagedTypeInfo {
                is_object_reference: true,
                base_type: Some(OBJECT),
                base_size: 32,
                fields: vec![
                    managed_field("Value", INT32, 0),
                    managed_field("Next", NODE, 8),
                    managed_field("Items", INT32_ARRAY, 16),
                ],
                ..managed_info("Sample.Node", ElementKind::Class)
            },
        );
        managed.insert(
            LEAF,
            ManagedTypeInfo {
                is_object_reference: true,
                base_type: Some(NODE),
                base_size: 40,
                fields: vec![managed_field("Weight", INT32, 24)],
                ..managed_info("Sample.Leaf", ElementKind::Class)
            },
        );
        managed.insert(
            INT32_ARRAY,
            ManagedTypeInfo {
                is_array: true,
                is_object_reference: true,
                component_type: Some(INT32),
                element_size: 4,
                base_size: 16,
                ..managed_info("System.Int32[]", ElementKind::SzArray)
            },
        );

        let objects = HashMap::from([(NODE_OBJECT, NODE), (LEAF_OBJECT, LEAF), (INT_ARRAY_OBJECT, INT32_ARRAY)]);
        let arrays = HashMap::from([(INT_ARRAY_OBJECT, 3)]);

        Self {
            calls: CallCounts::default(),
            architecture: Architecture::X86_64,
            segments: RwLock::new(vec![(0x40_0000, image, "r-x"), (HEAP, heap, "rw-")]),
            unbacked: RwLock::new(HashMap::new()),
            types,
            globals,
            managed,
            objects,
            arrays,
        }
    }

    /// Overwrite target memory, as if the target ran
    pub fn poke(&self, address: u64, bytes: &[u8])
    {
        let mut segments = self.segments.write().unwrap();
        for (base, data, _) in segments.iter_mut() {
            if address >= *base && address < *base + data.len() as u64 {
                put(data, address - *base, bytes);
                return;
            }
        }
        panic!("poke outside of the image at 0x{address:x}");
    }

    /// Add a mapping after the existing ones
    pub fn map(&self, base: u64, bytes: Vec<u8>, permissions: &'static str)
    {
        self.segments.write().unwrap().push((base, bytes, permissions));
    }

    /// Report the mapping at `base` as `extra` bytes longer than its data;
    /// reads of the extra bytes fail
    pub fn report_unbacked(&self, base: u64, extra: u64)
    {
        self.unbacked.write().unwrap().insert(base, extra);
    }

    fn record(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<&NativeRecord>
    {
        self.types
            .get(&(module, type_id))
            .ok_or_else(|| SymscopeError::Provider(format!("unknown type {type_id} in module {module}")))
    }
}

impl SymbolProvider for FakeTarget
{
    fn read_memory(&self, address: Address, size: usize) -> SymscopeResult<Vec<u8>>
    {
        self.calls.read_memory.fetch_add(1, Ordering::SeqCst);
        let start = address.value();
        let segments = self.segments.read().unwrap();
        for (base, data, _) in segments.iter() {
            let end = base + data.len() as u64;
            if start >= *base && start.saturating_add(size as u64) <= end {
                let offset = usize::try_from(start - base).unwrap();
                return Ok(data[offset..offset + size].to_vec());
            }
        }
        Err(SymscopeError::MemoryReadFailed { address, size })
    }

    fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    fn memory_regions(&self) -> SymscopeResult<Vec<MemoryRegion>>
    {
        self.calls.memory_regions.fetch_add(1, Ordering::SeqCst);
        // Reported in reverse order on purpose.
        let segments = self.segments.read().unwrap();
        let unbacked = self.unbacked.read().unwrap();
        Ok(segments
            .iter()
            .rev()
            .enumerate()
            .map(|(i, (base, data, permissions))| {
                let size = data.len() as u64 + unbacked.get(base).copied().unwrap_or(0);
                MemoryRegion::with_size(MemoryRegionId(i), Address::from(*base), size, permissions)
            })
            .collect())
    }

    fn modules(&self) -> SymscopeResult<Vec<ModuleInfo>>
    {
        Ok(vec![
            ModuleInfo {
                id: APP,
                name: "app".to_string(),
                base: Address::from(0x40_0000),
                size: 0x4000,
            },
            ModuleInfo {
                id: LIB,
                name: "lib".to_string(),
                base: Address::from(0x80_0000),
                size: 0x1000,
            },
        ])
    }

    fn find_type(&self, module: ModuleId, name: &str) -> SymscopeResult<Option<NativeTypeId>>
    {
        Ok(self
            .types
            .iter()
            .find(|((owner, _), record)| *owner == module && record.name == name)
            .map(|((_, id), _)| *id))
    }

    fn type_tag(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<TypeTag>
    {
        Ok(self.record(module, type_id)?.tag)
    }

    fn builtin_type(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<BuiltinType>
    {
        Ok(self.record(module, type_id)?.builtin)
    }

    fn type_name(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<String>
    {
        self.calls.type_name.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(module, type_id)?.name.to_string())
    }

    fn type_size(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<u64>
    {
        self.calls.type_size.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(module, type_id)?.size)
    }

    fn element_type(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<NativeTypeId>
    {
        self.record(module, type_id)?
            .element
            .ok_or_else(|| SymscopeError::Provider(format!("type {type_id} has no element type")))
    }

    fn pointer_to_type(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Option<NativeTypeId>>
    {
        // Only `Base*` has a record; everything else gets a synthetic pointer.
        Ok((module == APP && type_id == BASE).then_some(BASE_PTR))
    }

    fn type_fields(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Vec<NativeField>>
    {
        self.calls.type_fields.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(module, type_id)?.fields.clone())
    }

    fn direct_base_classes(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Vec<NativeBaseClass>>
    {
        self.calls.base_classes.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(module, type_id)?.bases.clone())
    }

    fn enum_name(&self, module: ModuleId, type_id: NativeTypeId, value: u64) -> SymscopeResult<Option<String>>
    {
        if module != APP || type_id != COLOR {
            return Ok(None);
        }
        Ok(match value {
            0 => Some("Red".to_string()),
            1 => Some("Green".to_string()),
            _ => None,
        })
    }

    fn virtual_base_address(
        &self,
        module: ModuleId,
        derived: NativeTypeId,
        object: Address,
        base: NativeTypeId,
    ) -> SymscopeResult<Address>
    {
        if module == APP && derived == DIAMOND && base == VBASE {
            return Ok(object + 32);
        }
        Err(SymscopeError::Provider(format!("{base} is not a virtual base of {derived}")))
    }

    fn runtime_type(&self, vtable: Address) -> SymscopeResult<Option<RuntimeTypeInfo>>
    {
        self.calls.runtime_type.fetch_add(1, Ordering::SeqCst);
        let found = match vtable.value() {
            DERIVED_VTABLE => Some((DERIVED, 0)),
            DIAMOND_VTABLE => Some((DIAMOND, 0)),
            DERIVED_SECOND_VTABLE => Some((DERIVED, 8)),
            _ => None,
        };
        Ok(found.map(|(type_id, offset)| RuntimeTypeInfo {
            module: APP,
            type_id,
            offset,
        }))
    }

    fn global_variable(&self, module: ModuleId, name: &str) -> SymscopeResult<Option<GlobalVariable>>
    {
        if module != APP {
            return Ok(None);
        }
        Ok(self.globals.get(name).copied())
    }

    fn is_public_function(&self, address: Address) -> SymscopeResult<bool>
    {
        Ok(matches!(address.value(), THUNK | PLAIN_FUNCTION))
    }
}

impl ManagedRuntime for FakeTarget
{
    fn type_info(&self, handle: ManagedTypeHandle) -> SymscopeResult<ManagedTypeInfo>
    {
        self.calls.managed_type_info.fetch_add(1, Ordering::SeqCst);
        self.managed
            .get(&handle)
            .cloned()
            .ok_or_else(|| SymscopeError::Provider(format!("unknown managed type {handle}")))
    }

    fn find_type(&self, module: Option<ModuleId>, name: &str) -> SymscopeResult<Option<ManagedTypeHandle>>
    {
        Ok(self
            .managed
            .iter()
            .find(|(_, info)| info.name == name && module.map_or(true, |module| module == info.module))
            .map(|(handle, _)| *handle))
    }

    fn array_length(&self, _handle: ManagedTypeHandle, object: Address) -> SymscopeResult<u64>
    {
        self.arrays
            .get(&object.value())
            .copied()
            .ok_or_else(|| SymscopeError::Provider(format!("no array at {object}")))
    }

    fn array_element_address(&self, handle: ManagedTypeHandle, object: Address, index: u64) -> SymscopeResult<Address>
    {
        let element_size = self.type_info(handle)?.element_size;
        Ok(object + 16 + index * element_size)
    }

    fn object_type(&self, object: Address) -> SymscopeResult<Option<ManagedTypeHandle>>
    {
        Ok(self.objects.get(&object.value()).copied())
    }
}

/// Native-only process over a fresh fake target
pub fn native_process() -> (Arc<FakeTarget>, Process)
{
    native_process_with(SessionConfig::default())
}

pub fn native_process_with(config: SessionConfig) -> (Arc<FakeTarget>, Process)
{
    let target = Arc::new(FakeTarget::new());
    let process = Process::builder(target.clone()).with_config(config).build();
    (target, process)
}

/// Process with the managed runtime attached
pub fn managed_process() -> (Arc<FakeTarget>, Process)
{
    let target = Arc::new(FakeTarget::new());
    let process = Process::builder(target.clone())
        .with_managed_runtime(target.clone())
        .with_config(SessionConfig::default())
        .build();
    (target, process)
}
