//! # Linux `/proc` Provider
//!
//! A memory-only [`SymbolProvider`] for a live Linux process.
//!
//! Memory is read through `/proc/<pid>/mem` and the region list comes from
//! `/proc/<pid>/maps`. Every file-backed mapping is grouped into a module
//! named after the file stem. There is no debug-information reader behind
//! this provider, so type lookups find nothing and layout queries fail with
//! a provider error; everything that only needs raw memory (regions, reads,
//! strings, pattern search) works.
//!
//! Reading another process's memory needs the same permission as attaching
//! with `ptrace` (same user and a permissive `kernel.yama.ptrace_scope`, or
//! `CAP_SYS_PTRACE`).

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use symscope_core::descriptor::{BuiltinType, TypeTag};
use symscope_core::error::{SymscopeError, SymscopeResult};
use symscope_core::provider::{GlobalVariable, ModuleInfo, NativeBaseClass, NativeField, RuntimeTypeInfo, SymbolProvider};
use symscope_core::types::{Address, Architecture, MemoryRegion, MemoryRegionId, ModuleId, NativeTypeId, ProcessId};
use symscope_utils::{debug, trace};

/// Provider over `/proc/<pid>`
#[derive(Debug)]
pub struct ProcfsProvider
{
    pid: ProcessId,
    root: PathBuf,
    mem: Mutex<File>,
}

impl ProcfsProvider
{
    /// Open `/proc/<pid>/mem` for reading
    ///
    /// ## Errors
    ///
    /// Returns `Io` if the process does not exist or access is denied.
    pub fn attach(pid: ProcessId) -> SymscopeResult<Self>
    {
        let root = Path::new("/proc").join(pid.to_string());
        let mem = File::open(root.join("mem"))?;
        debug!(%pid, "opened process memory");
        Ok(Self {
            pid,
            root,
            mem: Mutex::new(mem),
        })
    }

    fn maps(&self) -> SymscopeResult<Vec<MapsEntry>>
    {
        let text = fs::read_to_string(self.root.join("maps"))?;
        parse_maps(&text)
    }

    fn no_debug_info<T>(&self, module: ModuleId, query: &str) -> SymscopeResult<T>
    {
        Err(SymscopeError::Provider(format!(
            "no debug information for module {module} of process {} ({query})",
            self.pid
        )))
    }
}

impl SymbolProvider for ProcfsProvider
{
    fn read_memory(&self, address: Address, size: usize) -> SymscopeResult<Vec<u8>>
    {
        let mut mem = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buffer = vec![0_u8; size];
        let result = mem
            .seek(SeekFrom::Start(address.value()))
            .and_then(|_| mem.read_exact(&mut buffer));
        match result {
            Ok(()) => Ok(buffer),
            Err(error) => {
                trace!(%address, size, %error, "memory read failed");
                Err(SymscopeError::MemoryReadFailed { address, size })
            }
        }
    }

    fn architecture(&self) -> Architecture
    {
        Architecture::current()
    }

    fn memory_regions(&self) -> SymscopeResult<Vec<MemoryRegion>>
    {
        Ok(self
            .maps()?
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                MemoryRegion::new(
                    MemoryRegionId(index),
                    entry.start,
                    entry.end,
                    entry.permissions,
                    entry.path,
                )
            })
            .collect())
    }

    fn modules(&self) -> SymscopeResult<Vec<ModuleInfo>>
    {
        Ok(group_modules(&self.maps()?))
    }

    fn find_type(&self, _module: ModuleId, _name: &str) -> SymscopeResult<Option<NativeTypeId>>
    {
        Ok(None)
    }

    fn type_tag(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<TypeTag>
    {
        self.no_debug_info(module, "type tag")
    }

    fn builtin_type(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<BuiltinType>
    {
        self.no_debug_info(module, "builtin type")
    }

    fn type_name(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<String>
    {
        self.no_debug_info(module, "type name")
    }

    fn type_size(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<u64>
    {
        self.no_debug_info(module, "type size")
    }

    fn element_type(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<NativeTypeId>
    {
        self.no_debug_info(module, "element type")
    }

    fn type_fields(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<Vec<NativeField>>
    {
        self.no_debug_info(module, "fields")
    }

    fn direct_base_classes(&self, module: ModuleId, _type_id: NativeTypeId) -> SymscopeResult<Vec<NativeBaseClass>>
    {
        self.no_debug_info(module, "base classes")
    }

    fn virtual_base_address(
        &self,
        module: ModuleId,
        _derived: NativeTypeId,
        _object: Address,
        _base: NativeTypeId,
    ) -> SymscopeResult<Address>
    {
        self.no_debug_info(module, "virtual base")
    }

    fn runtime_type(&self, _vtable: Address) -> SymscopeResult<Option<RuntimeTypeInfo>>
    {
        Ok(None)
    }

    fn global_variable(&self, _module: ModuleId, _name: &str) -> SymscopeResult<Option<GlobalVariable>>
    {
        Ok(None)
    }
}

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
struct MapsEntry
{
    start: Address,
    end: Address,
    permissions: String,
    path: Option<String>,
}

/// Parse the text of `/proc/<pid>/maps`
///
/// Each line reads `start-end perms offset dev inode [path]`; the path may
/// contain spaces.
fn parse_maps(text: &str) -> SymscopeResult<Vec<MapsEntry>>
{
    let malformed = |line: &str| SymscopeError::Provider(format!("malformed maps line `{line}`"));

    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace();
            let range = fields.next().ok_or_else(|| malformed(line))?;
            let permissions = fields.next().ok_or_else(|| malformed(line))?;
            // offset, device and inode
            for _ in 0..3 {
                fields.next().ok_or_else(|| malformed(line))?;
            }
            let path = fields.collect::<Vec<_>>().join(" ");

            let (start, end) = range.split_once('-').ok_or_else(|| malformed(line))?;
            let start = u64::from_str_radix(start, 16).map_err(|_| malformed(line))?;
            let end = u64::from_str_radix(end, 16).map_err(|_| malformed(line))?;

            Ok(MapsEntry {
                start: Address::from(start),
                end: Address::from(end),
                permissions: permissions.chars().take(3).collect(),
                path: (!path.is_empty()).then_some(path),
            })
        })
        .collect()
}

/// Group file-backed mappings into modules, ordered by load address
fn group_modules(entries: &[MapsEntry]) -> Vec<ModuleInfo>
{
    let mut images: BTreeMap<&str, (Address, Address)> = BTreeMap::new();
    for entry in entries {
        let Some(path) = entry.path.as_deref().filter(|path| path.starts_with('/')) else {
            continue;
        };
        images
            .entry(path)
            .and_modify(|(start, end)| {
                *start = (*start).min(entry.start);
                *end = (*end).max(entry.end);
            })
            .or_insert((entry.start, entry.end));
    }

    let mut images: Vec<(&str, Address, Address)> =
        images.into_iter().map(|(path, (start, end))| (path, start, end)).collect();
    images.sort_by_key(|&(_, start, _)| start);

    images
        .into_iter()
        .enumerate()
        .map(|(index, (path, start, end))| ModuleInfo {
            id: ModuleId(u32::try_from(index).unwrap_or(u32::MAX)),
            name: Path::new(path)
                .file_stem()
                .map_or_else(|| path.to_string(), |stem| stem.to_string_lossy().into_owned()),
            base: start,
            size: end.value() - start.value(),
        })
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    const MAPS: &str = "\
00400000-00452000 r-xp 00000000 08:02 173521      /usr/bin/dbus-daemon
00651000-00652000 r--p 00051000 08:02 173521      /usr/bin/dbus-daemon
00652000-00655000 rw-p 00052000 08:02 173521      /usr/bin/dbus-daemon
00e03000-00e24000 rw-p 00000000 00:00 0           [heap]
7f2c3c000000-7f2c3c021000 r-xp 00000000 08:02 135522  /lib/x86_64-linux-gnu/libc.so.6
7f2c3d000000-7f2c3d001000 rw-p 00000000 08:02 135600  /opt/my app/plugin.so
7ffc9a8f0000-7ffc9a911000 rw-p 00000000 00:00 0           [stack]
7ffc9a9c0000-7ffc9a9c2000 r-xp 00000000 00:00 0
";

    #[test]
    fn test_parse_maps()
    {
        let entries = parse_maps(MAPS).unwrap();
        assert_eq!(entries.len(), 8);

        assert_eq!(entries[0].start, Address::from(0x40_0000));
        assert_eq!(entries[0].end, Address::from(0x45_2000));
        assert_eq!(entries[0].permissions, "r-x");
        assert_eq!(entries[0].path.as_deref(), Some("/usr/bin/dbus-daemon"));

        assert_eq!(entries[3].path.as_deref(), Some("[heap]"));
        assert_eq!(entries[5].path.as_deref(), Some("/opt/my app/plugin.so"));
        assert_eq!(entries[7].path, None);
    }

    #[test]
    fn test_parse_maps_rejects_garbage()
    {
        assert!(parse_maps("not a maps line").is_err());
        assert!(parse_maps("zzzz-0001 r-xp 0 0 0").is_err());
    }

    #[test]
    fn test_group_modules()
    {
        let modules = group_modules(&parse_maps(MAPS).unwrap());
        let names: Vec<&str> = modules.iter().map(|module| module.name.as_str()).collect();
        assert_eq!(names, ["dbus-daemon", "libc.so", "plugin"]);

        assert_eq!(modules[0].id, ModuleId(0));
        assert_eq!(modules[0].base, Address::from(0x40_0000));
        assert_eq!(modules[0].size, 0x25_5000);
        assert!(modules[1].contains(Address::from(0x7f2c_3c00_0100)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reads_own_memory()
    {
        static MARKER: [u8; 8] = *b"symscope";

        let provider = ProcfsProvider::attach(ProcessId::from(std::process::id())).unwrap();
        let address = Address::from(MARKER.as_ptr() as u64);
        assert_eq!(provider.read_memory(address, MARKER.len()).unwrap(), MARKER);

        let regions = provider.memory_regions().unwrap();
        assert!(regions.iter().any(|region| region.contains(address)));
        assert!(matches!(
            provider.read_memory(Address::ZERO, 8),
            Err(SymscopeError::MemoryReadFailed { .. })
        ));
    }
}
