//! Provides structures for JSON encoding and decoding

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instruction {
    pub opcode: String,
    pub disasm: String,
    pub mnemonic: String,
    pub jump: Option<u64>,
    pub fail: Option<u64>,
    pub addr: u64,
    pub bytes: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub inst_type: String,
    pub family: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossRef {
    pub from: u64,
    pub to: u64, // absent in `axtj` answers
    #[serde(rename = "type")]
    pub ref_type: String,
}

impl CrossRef {
    /// Control flow reference (jump or call).
    pub fn is_code(&self) -> bool {
        self.ref_type.eq_ignore_ascii_case("code") || self.ref_type.eq_ignore_ascii_case("call")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionInfo {
    pub offset: u64,
    pub name: String,
    pub size: u64,
    pub noreturn: bool,
    pub nbbs: u64, // number of basic blocks
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Information {
    pub core: CoreInfo,
    pub bin: BinInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreInfo {
    pub file: String,
    pub size: u64,
    pub mode: String,
    pub format: String,
}

#[derive(Debug, Copy, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "endian")]
pub enum Endian {
    #[serde(rename = "BE")]
    Big,
    #[serde(rename = "LE")]
    #[default]
    Little,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BinInfo {
    pub arch: String,
    pub bits: usize,
    pub endian: Endian,
    pub os: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryInfo {
    pub vaddr: u64,
    pub paddr: u64,
    pub baddr: u64,
    pub laddr: u64,
    pub haddr: u64,
    pub etype: String,
}
