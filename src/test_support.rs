//! Synthetic binary images for tests
//!
//! Builders producing minimal but structurally valid ELF and PE images
//! in memory, so parser, search and graph tests never depend on
//! binaries checked into the repository.

pub mod elf {
    use std::io::Write;

    /// Write bytes into a named temporary file and keep it alive.
    pub fn write_temp_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    /// Builds a little-endian ELF image with a `.dynamic` section, its
    /// string table and a section name table.
    pub struct ElfImageBuilder {
        class64: bool,
        needed: Vec<String>,
        soname: Option<String>,
        runpath: Option<String>,
        rpath: Option<String>,
        debug_section: bool,
    }

    impl ElfImageBuilder {
        /// 64-bit x86_64 shared object.
        pub fn new() -> Self {
            Self {
                class64: true,
                needed: Vec::new(),
                soname: None,
                runpath: None,
                rpath: None,
                debug_section: false,
            }
        }

        /// 32-bit x86 image, header only.
        pub fn new_elf32() -> Self {
            Self {
                class64: false,
                needed: Vec::new(),
                soname: None,
                runpath: None,
                rpath: None,
                debug_section: false,
            }
        }

        pub fn needed(mut self, name: &str) -> Self {
            self.needed.push(name.to_owned());
            self
        }

        pub fn soname(mut self, name: &str) -> Self {
            self.soname = Some(name.to_owned());
            self
        }

        pub fn runpath(mut self, runpath: &str) -> Self {
            self.runpath = Some(runpath.to_owned());
            self
        }

        pub fn rpath(mut self, rpath: &str) -> Self {
            self.rpath = Some(rpath.to_owned());
            self
        }

        pub fn with_debug_section(mut self) -> Self {
            self.debug_section = true;
            self
        }

        pub fn build(&self) -> Vec<u8> {
            if !self.class64 {
                return self.build_elf32_header();
            }

            // Dynamic string table: offset 0 is the empty string.
            let mut dynstr = vec![0u8];
            let string_offset = |table: &mut Vec<u8>, s: &str| -> u64 {
                let offset = table.len() as u64;
                table.extend_from_slice(s.as_bytes());
                table.push(0);
                offset
            };
            let needed_offsets: Vec<u64> = self
                .needed
                .iter()
                .map(|n| string_offset(&mut dynstr, n))
                .collect();
            let soname_offset = self.soname.as_ref().map(|s| string_offset(&mut dynstr, s));
            let runpath_offset = self
                .runpath
                .as_ref()
                .map(|s| string_offset(&mut dynstr, s));
            let rpath_offset = self.rpath.as_ref().map(|s| string_offset(&mut dynstr, s));

            // Dynamic entries, terminated by DT_NULL.
            let mut dynamic = Vec::new();
            let push_entry = |table: &mut Vec<u8>, tag: i64, value: u64| {
                table.extend_from_slice(&tag.to_le_bytes());
                table.extend_from_slice(&value.to_le_bytes());
            };
            for offset in &needed_offsets {
                push_entry(&mut dynamic, 1, *offset); // DT_NEEDED
            }
            if let Some(offset) = soname_offset {
                push_entry(&mut dynamic, 14, offset); // DT_SONAME
            }
            if let Some(offset) = rpath_offset {
                push_entry(&mut dynamic, 15, offset); // DT_RPATH
            }
            if let Some(offset) = runpath_offset {
                push_entry(&mut dynamic, 29, offset); // DT_RUNPATH
            }
            push_entry(&mut dynamic, 0, 0); // DT_NULL

            let shstrtab = b"\0.dynamic\0.dynstr\0.shstrtab\0.debug_info\0".to_vec();
            let (name_dynamic, name_dynstr, name_shstrtab, name_debug) = (1u32, 10u32, 18u32, 28u32);

            let section_count: u64 = if self.debug_section { 5 } else { 4 };
            let shdr_table_offset = 64u64;
            let dynstr_offset = shdr_table_offset + section_count * 64;
            let dynamic_offset = dynstr_offset + dynstr.len() as u64;
            let shstrtab_offset = dynamic_offset + dynamic.len() as u64;
            let image_end = shstrtab_offset + shstrtab.len() as u64;

            let mut image = vec![0u8; image_end as usize];

            // File header.
            image[0..4].copy_from_slice(b"\x7fELF");
            image[4] = 2; // ELFCLASS64
            image[5] = 1; // little endian
            image[6] = 1; // EV_CURRENT
            image[16..18].copy_from_slice(&3u16.to_le_bytes()); // ET_DYN
            image[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
            image[20..24].copy_from_slice(&1u32.to_le_bytes());
            image[40..48].copy_from_slice(&shdr_table_offset.to_le_bytes());
            image[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
            image[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
            image[60..62].copy_from_slice(&(section_count as u16).to_le_bytes());
            image[62..64].copy_from_slice(&3u16.to_le_bytes()); // e_shstrndx

            let write_section =
                |image: &mut Vec<u8>, index: u64, name: u32, sh_type: u32, offset: u64, size: u64, link: u32| {
                    let base = (shdr_table_offset + index * 64) as usize;
                    image[base..base + 4].copy_from_slice(&name.to_le_bytes());
                    image[base + 4..base + 8].copy_from_slice(&sh_type.to_le_bytes());
                    image[base + 24..base + 32].copy_from_slice(&offset.to_le_bytes());
                    image[base + 32..base + 40].copy_from_slice(&size.to_le_bytes());
                    image[base + 40..base + 44].copy_from_slice(&link.to_le_bytes());
                };

            // Section 0 stays all zeros (SHN_UNDEF).
            write_section(
                &mut image,
                1,
                name_dynamic,
                6, // SHT_DYNAMIC
                dynamic_offset,
                dynamic.len() as u64,
                2, // links to .dynstr
            );
            write_section(
                &mut image,
                2,
                name_dynstr,
                3, // SHT_STRTAB
                dynstr_offset,
                dynstr.len() as u64,
                0,
            );
            write_section(
                &mut image,
                3,
                name_shstrtab,
                3,
                shstrtab_offset,
                shstrtab.len() as u64,
                0,
            );
            if self.debug_section {
                write_section(&mut image, 4, name_debug, 1, image_end, 0, 0);
            }

            image[dynstr_offset as usize..(dynstr_offset as usize + dynstr.len())]
                .copy_from_slice(&dynstr);
            image[dynamic_offset as usize..(dynamic_offset as usize + dynamic.len())]
                .copy_from_slice(&dynamic);
            image[shstrtab_offset as usize..(shstrtab_offset as usize + shstrtab.len())]
                .copy_from_slice(&shstrtab);

            image
        }

        fn build_elf32_header(&self) -> Vec<u8> {
            let mut image = vec![0u8; 52];
            image[0..4].copy_from_slice(b"\x7fELF");
            image[4] = 1; // ELFCLASS32
            image[5] = 1;
            image[6] = 1;
            image[16..18].copy_from_slice(&3u16.to_le_bytes()); // ET_DYN
            image[18..20].copy_from_slice(&3u16.to_le_bytes()); // EM_386
            image[20..24].copy_from_slice(&1u32.to_le_bytes());
            image
        }
    }
}

pub mod pe {
    /// Builds a little PE image with a single `.idata` section holding
    /// the import directory.
    pub struct PeImageBuilder {
        pe32_plus: bool,
        machine: u16,
        imports: Vec<String>,
    }

    const LFANEW: u32 = 0x80;
    const SECTION_RVA: u32 = 0x1000;
    const SECTION_RAW_OFFSET: u32 = 0x400;

    impl PeImageBuilder {
        /// PE32+ x86_64 image.
        pub fn new() -> Self {
            Self {
                pe32_plus: true,
                machine: 0x8664,
                imports: Vec::new(),
            }
        }

        /// PE32 x86 image.
        pub fn new_pe32() -> Self {
            Self {
                pe32_plus: false,
                machine: 0x014c,
                imports: Vec::new(),
            }
        }

        pub fn import(mut self, dll_name: &str) -> Self {
            self.imports.push(dll_name.to_owned());
            self
        }

        pub fn build(&self) -> Vec<u8> {
            // Import section contents: descriptors, terminator, names.
            let descriptor_bytes = (self.imports.len() + 1) * 20;
            let mut names = Vec::new();
            let mut name_rvas = Vec::new();
            for name in &self.imports {
                name_rvas.push(SECTION_RVA + descriptor_bytes as u32 + names.len() as u32);
                names.extend_from_slice(name.as_bytes());
                names.push(0);
            }
            let mut section_data = Vec::new();
            for rva in &name_rvas {
                let mut descriptor = [0u8; 20];
                descriptor[12..16].copy_from_slice(&rva.to_le_bytes());
                section_data.extend_from_slice(&descriptor);
            }
            section_data.extend_from_slice(&[0u8; 20]); // terminator
            section_data.extend_from_slice(&names);

            let optional_len: u16 = if self.pe32_plus { 112 + 128 } else { 96 + 128 };
            let optional_offset = LFANEW as usize + 24;
            let section_table_offset = optional_offset + optional_len as usize;
            assert!(section_table_offset + 40 <= SECTION_RAW_OFFSET as usize);

            let mut image = vec![0u8; SECTION_RAW_OFFSET as usize + section_data.len()];

            // DOS header.
            image[0..2].copy_from_slice(b"MZ");
            image[60..64].copy_from_slice(&LFANEW.to_le_bytes());

            // Signature and COFF header.
            let lfanew = LFANEW as usize;
            image[lfanew..lfanew + 4].copy_from_slice(b"PE\0\0");
            let coff = lfanew + 4;
            image[coff..coff + 2].copy_from_slice(&self.machine.to_le_bytes());
            image[coff + 2..coff + 4].copy_from_slice(&1u16.to_le_bytes()); // sections
            image[coff + 16..coff + 18].copy_from_slice(&optional_len.to_le_bytes());
            image[coff + 18..coff + 20].copy_from_slice(&0x0022u16.to_le_bytes());

            // Optional header: magic, directory count, directories.
            let magic: u16 = if self.pe32_plus { 0x20b } else { 0x10b };
            image[optional_offset..optional_offset + 2].copy_from_slice(&magic.to_le_bytes());
            let count_offset = optional_offset + if self.pe32_plus { 108 } else { 92 };
            image[count_offset..count_offset + 4].copy_from_slice(&16u32.to_le_bytes());
            if !self.imports.is_empty() {
                let import_dir = count_offset + 4 + 8; // directory index 1
                image[import_dir..import_dir + 4]
                    .copy_from_slice(&SECTION_RVA.to_le_bytes());
                image[import_dir + 4..import_dir + 8]
                    .copy_from_slice(&(descriptor_bytes as u32).to_le_bytes());
            }

            // Section table: one .idata section.
            let section = section_table_offset;
            image[section..section + 6].copy_from_slice(b".idata");
            image[section + 8..section + 12]
                .copy_from_slice(&(section_data.len() as u32).to_le_bytes());
            image[section + 12..section + 16].copy_from_slice(&SECTION_RVA.to_le_bytes());
            image[section + 16..section + 20]
                .copy_from_slice(&(section_data.len() as u32).to_le_bytes());
            image[section + 20..section + 24].copy_from_slice(&SECTION_RAW_OFFSET.to_le_bytes());

            image[SECTION_RAW_OFFSET as usize..].copy_from_slice(&section_data);

            image
        }
    }
}
