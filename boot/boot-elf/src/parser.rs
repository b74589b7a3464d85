use bitfield_struct::bitfield;
use boot_info::{PhysAddr, VirtAddr};
use core::mem::size_of;
use core::ptr::read_unaligned;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;

const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_X86_64: u16 = 62;
const PT_LOAD: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names)]
struct Elf64Ehdr {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u64,
    e_phoff: u64,
    e_shoff: u64,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(clippy::struct_field_names)]
struct Elf64Phdr {
    p_type: u32,
    p_flags: PFlags,
    p_offset: u64,
    p_vaddr: u64,
    p_paddr: u64,
    p_filesz: u64,
    p_memsz: u64,
    p_align: u64,
}

/// Why an image was rejected. One variant per identity check, so the log
/// line names the exact mismatch.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum ElfError {
    #[error("image shorter than an ELF64 header ({0} bytes)")]
    TooShort(usize),

    #[error("bad magic, not an ELF image")]
    BadMagic,

    #[error("wrong class {0:#04x}, expected ELF64")]
    WrongClass(u8),

    #[error("wrong byte order {0:#04x}, expected little-endian")]
    WrongByteOrder(u8),

    #[error("wrong machine {0:#06x}, expected x86-64")]
    WrongMachine(u16),

    #[error("wrong identification version {0:#04x}")]
    WrongVersion(u8),

    #[error("wrong object type {0:#06x}, expected executable")]
    WrongType(u16),

    #[error("program header entry size {0} smaller than the ELF64 layout")]
    PhdrEntrySize(u16),

    #[error("program header table extends past the image")]
    PhdrTableBounds,
}

/// Program-header quadruple of a loadable segment, plus the flags the mapper
/// will eventually care about.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LoadSegment {
    pub vaddr: VirtAddr,
    pub paddr: PhysAddr,
    pub filesz: u64,
    pub memsz: u64,
    pub offset: u64,
    pub flags: PFlags,
    pub align: u64,
}

/// One walked program header.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProgramHeader {
    /// A `PT_LOAD` entry, fully decoded.
    Load(LoadSegment),
    /// Anything else, identified by its `p_type`.
    Other(u32),
}

/// A validated ELF64 image. Table geometry is resolved (and bounds-checked)
/// once during [`parse`](Self::parse).
#[derive(Debug)]
pub struct ElfImage<'a> {
    bytes: &'a [u8],
    ehdr: Elf64Ehdr,
    phoff: usize,
    stride: usize,
    count: usize,
}

impl core::fmt::Debug for Elf64Ehdr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Elf64Ehdr")
            .field("e_type", &self.e_type)
            .field("e_machine", &self.e_machine)
            .field("e_entry", &self.e_entry)
            .field("e_phnum", &self.e_phnum)
            .finish_non_exhaustive()
    }
}

impl<'a> ElfImage<'a> {
    const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

    /// Run the identity checks, in order, stopping at the first failure.
    ///
    /// # Errors
    /// One [`ElfError`] per check; the first mismatch wins.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ElfError> {
        if bytes.len() < size_of::<Elf64Ehdr>() {
            return Err(ElfError::TooShort(bytes.len()));
        }

        // SAFETY: bounds checked above; read_unaligned because the slice
        // carries no alignment guarantee.
        let ehdr = unsafe { read_unaligned(bytes.as_ptr().cast::<Elf64Ehdr>()) };

        if ehdr.e_ident[0..4] != Self::MAGIC {
            return Err(ElfError::BadMagic);
        }
        if ehdr.e_ident[EI_CLASS] != ELFCLASS64 {
            return Err(ElfError::WrongClass(ehdr.e_ident[EI_CLASS]));
        }
        if ehdr.e_ident[EI_DATA] != ELFDATA2LSB {
            return Err(ElfError::WrongByteOrder(ehdr.e_ident[EI_DATA]));
        }
        if ehdr.e_machine != EM_X86_64 {
            return Err(ElfError::WrongMachine(ehdr.e_machine));
        }
        if ehdr.e_ident[EI_VERSION] != EV_CURRENT {
            return Err(ElfError::WrongVersion(ehdr.e_ident[EI_VERSION]));
        }
        if ehdr.e_type != ET_EXEC {
            return Err(ElfError::WrongType(ehdr.e_type));
        }

        // Table geometry. The stride is e_phentsize as declared, which may
        // exceed the struct size; it must never undershoot it.
        let stride = usize::from(ehdr.e_phentsize);
        if stride < size_of::<Elf64Phdr>() {
            return Err(ElfError::PhdrEntrySize(ehdr.e_phentsize));
        }
        let count = usize::from(ehdr.e_phnum);
        let phoff = usize::try_from(ehdr.e_phoff).map_err(|_| ElfError::PhdrTableBounds)?;
        let table_size = stride.checked_mul(count).ok_or(ElfError::PhdrTableBounds)?;
        let end = phoff
            .checked_add(table_size)
            .ok_or(ElfError::PhdrTableBounds)?;
        if end > bytes.len() {
            return Err(ElfError::PhdrTableBounds);
        }

        Ok(Self {
            bytes,
            ehdr,
            phoff,
            stride,
            count,
        })
    }

    /// Entry point recorded in the header.
    #[must_use]
    pub const fn entry(&self) -> VirtAddr {
        VirtAddr::new(self.ehdr.e_entry)
    }

    /// Number of program headers the walk will yield.
    #[must_use]
    pub const fn program_header_count(&self) -> usize {
        self.count
    }

    /// Walk all `e_phnum` program headers at the declared stride.
    #[must_use]
    pub const fn program_headers(&self) -> ProgramHeaders<'a> {
        ProgramHeaders {
            bytes: self.bytes,
            offset: self.phoff,
            stride: self.stride,
            remaining: self.count,
        }
    }

    /// Just the loadable segments, in file order.
    pub fn load_segments(&self) -> impl Iterator<Item = LoadSegment> + use<'a> {
        self.program_headers().filter_map(|header| match header {
            ProgramHeader::Load(segment) => Some(segment),
            ProgramHeader::Other(_) => None,
        })
    }
}

/// Iterator over the program-header table. Yields exactly `e_phnum` items;
/// bounds were established during [`ElfImage::parse`].
pub struct ProgramHeaders<'a> {
    bytes: &'a [u8],
    offset: usize,
    stride: usize,
    remaining: usize,
}

impl Iterator for ProgramHeaders<'_> {
    type Item = ProgramHeader;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        // SAFETY: parse() verified that e_phnum entries of e_phentsize bytes
        // starting at e_phoff lie within the slice.
        let phdr = unsafe {
            read_unaligned(self.bytes.as_ptr().add(self.offset).cast::<Elf64Phdr>())
        };
        self.offset += self.stride;

        if phdr.p_type == PT_LOAD {
            Some(ProgramHeader::Load(LoadSegment {
                vaddr: VirtAddr::new(phdr.p_vaddr),
                paddr: PhysAddr::new(phdr.p_paddr),
                filesz: phdr.p_filesz,
                memsz: phdr.p_memsz,
                offset: phdr.p_offset,
                flags: phdr.p_flags,
                align: phdr.p_align,
            }))
        } else {
            Some(ProgramHeader::Other(phdr.p_type))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ProgramHeaders<'_> {}

/// `Elf64_Phdr.p_flags`.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PFlags {
    pub execute: bool,
    pub write: bool,
    pub read: bool,
    #[bits(29)]
    __: u32,
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    const EHDR_SIZE: usize = size_of::<Elf64Ehdr>();
    const PHDR_SIZE: usize = size_of::<Elf64Phdr>();

    struct Fixture {
        bytes: Vec<u8>,
    }

    impl Fixture {
        /// A well-formed executable with `phnum` program headers placed
        /// directly after the file header, at the given stride.
        fn new(phnum: u16, stride: u16) -> Self {
            let mut bytes = vec![0u8; EHDR_SIZE + usize::from(phnum) * usize::from(stride)];
            bytes[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
            bytes[EI_CLASS] = ELFCLASS64;
            bytes[EI_DATA] = ELFDATA2LSB;
            bytes[EI_VERSION] = EV_CURRENT;
            bytes[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
            bytes[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
            bytes[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
            bytes[24..32].copy_from_slice(&0xFFFF_E000_0010_0000u64.to_le_bytes()); // e_entry
            bytes[32..40].copy_from_slice(&(EHDR_SIZE as u64).to_le_bytes()); // e_phoff
            bytes[54..56].copy_from_slice(&stride.to_le_bytes()); // e_phentsize
            bytes[56..58].copy_from_slice(&phnum.to_le_bytes()); // e_phnum
            Self { bytes }
        }

        fn set_phdr(&mut self, index: usize, p_type: u32, vaddr: u64, paddr: u64) {
            let stride =
                usize::from(u16::from_le_bytes([self.bytes[54], self.bytes[55]]));
            let base = EHDR_SIZE + index * stride;
            self.bytes[base..base + 4].copy_from_slice(&p_type.to_le_bytes());
            self.bytes[base + 16..base + 24].copy_from_slice(&vaddr.to_le_bytes());
            self.bytes[base + 24..base + 32].copy_from_slice(&paddr.to_le_bytes());
            self.bytes[base + 32..base + 40].copy_from_slice(&0x1000u64.to_le_bytes());
            self.bytes[base + 40..base + 48].copy_from_slice(&0x2000u64.to_le_bytes());
        }
    }

    #[test]
    fn accepts_well_formed_image() {
        let fixture = Fixture::new(0, PHDR_SIZE as u16);
        let image = ElfImage::parse(&fixture.bytes).unwrap();
        assert_eq!(image.entry().as_u64(), 0xFFFF_E000_0010_0000);
        assert_eq!(image.program_header_count(), 0);
    }

    #[test]
    fn rejects_truncated_header() {
        assert_eq!(
            ElfImage::parse(&[0u8; 32]).unwrap_err(),
            ElfError::TooShort(32)
        );
    }

    #[test]
    fn rejects_bad_magic_first() {
        // Multiple fields wrong; the magic check must win.
        let mut fixture = Fixture::new(0, PHDR_SIZE as u16);
        fixture.bytes[0] = 0x00;
        fixture.bytes[18] = 0x03; // also wrong machine
        assert_eq!(ElfImage::parse(&fixture.bytes).unwrap_err(), ElfError::BadMagic);
    }

    #[test]
    fn rejects_wrong_class() {
        let mut fixture = Fixture::new(0, PHDR_SIZE as u16);
        fixture.bytes[EI_CLASS] = 1; // ELF32
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::WrongClass(1)
        );
    }

    #[test]
    fn rejects_wrong_byte_order() {
        let mut fixture = Fixture::new(0, PHDR_SIZE as u16);
        fixture.bytes[EI_DATA] = 2; // big-endian
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::WrongByteOrder(2)
        );
    }

    #[test]
    fn rejects_wrong_machine_before_version() {
        let mut fixture = Fixture::new(0, PHDR_SIZE as u16);
        fixture.bytes[18..20].copy_from_slice(&0xB7u16.to_le_bytes()); // aarch64
        fixture.bytes[EI_VERSION] = 0; // also wrong version
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::WrongMachine(0xB7)
        );
    }

    #[test]
    fn rejects_wrong_version() {
        let mut fixture = Fixture::new(0, PHDR_SIZE as u16);
        fixture.bytes[EI_VERSION] = 0;
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::WrongVersion(0)
        );
    }

    #[test]
    fn rejects_relocatable_object() {
        let mut fixture = Fixture::new(0, PHDR_SIZE as u16);
        fixture.bytes[16..18].copy_from_slice(&1u16.to_le_bytes()); // ET_REL
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::WrongType(1)
        );
    }

    #[test]
    fn rejects_table_past_end_of_image() {
        let mut fixture = Fixture::new(2, PHDR_SIZE as u16);
        // Claim more headers than the buffer holds.
        fixture.bytes[56..58].copy_from_slice(&64u16.to_le_bytes());
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::PhdrTableBounds
        );
    }

    #[test]
    fn walks_exactly_phnum_entries() {
        let mut fixture = Fixture::new(3, PHDR_SIZE as u16);
        fixture.set_phdr(0, PT_LOAD, 0xFFFF_E000_0010_0000, 0x0010_0000);
        fixture.set_phdr(1, 4, 0, 0); // PT_NOTE
        fixture.set_phdr(2, PT_LOAD, 0xFFFF_E000_0020_0000, 0x0020_0000);

        let image = ElfImage::parse(&fixture.bytes).unwrap();
        let headers: Vec<_> = image.program_headers().collect();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[1], ProgramHeader::Other(4));

        let loads: Vec<_> = image.load_segments().collect();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[0].vaddr.as_u64(), 0xFFFF_E000_0010_0000);
        assert_eq!(loads[0].paddr.as_u64(), 0x0010_0000);
        assert_eq!(loads[0].filesz, 0x1000);
        assert_eq!(loads[0].memsz, 0x2000);
        assert_eq!(loads[1].paddr.as_u64(), 0x0020_0000);
    }

    #[test]
    fn honors_oversized_stride() {
        // A stride larger than the struct: the walker must skip the padding.
        let stride = (PHDR_SIZE + 8) as u16;
        let mut fixture = Fixture::new(2, stride);
        fixture.set_phdr(0, PT_LOAD, 0x1000, 0x1000);
        fixture.set_phdr(1, PT_LOAD, 0x2000, 0x2000);

        let image = ElfImage::parse(&fixture.bytes).unwrap();
        let loads: Vec<_> = image.load_segments().collect();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[1].vaddr.as_u64(), 0x2000);
    }

    #[test]
    fn rejects_undersized_stride() {
        let fixture = Fixture::new(1, 16);
        assert_eq!(
            ElfImage::parse(&fixture.bytes).unwrap_err(),
            ElfError::PhdrEntrySize(16)
        );
    }
}
