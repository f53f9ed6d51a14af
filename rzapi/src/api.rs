use rzpipe::rzpipe::RzPipe;
use quick_cache::sync::Cache;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::structs::*;

#[derive(Clone)]
pub struct RzApi {
    pub rzp: Arc<Mutex<RzPipe>>,
    pub info: Information,
    do_cache: bool,
    cache: Rc<Cache<String, String>>,
}

#[derive(thiserror::Error, Debug)]
pub enum RzError {
    #[error("{0}")]
    Init(#[from] rzpipe::RzInitError),

    #[error("{0}")]
    Pipe(#[from] rzpipe::RzPipeError),

    #[error("Unable to fit a json into type:{0} due to {1}")]
    Json(String, String),

    #[error("rz-pipe lock was poisoned")]
    Poisoned,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RzError>;

impl RzApi {
    const CACHE_SIZE: usize = 1000;

    /// Spawn rizin on the binary at `path`.
    pub fn new<T: AsRef<str>>(path: T) -> Result<RzApi> {
        let pipe = RzPipe::spawn(path.as_ref(), None)?;
        let mut rzapi = RzApi::from(pipe);
        rzapi.info = rzapi.get_info()?;
        rzapi.set_option("analysis.esil", "false")?;
        rzapi.set_option("scr.color", "0")?;
        Ok(rzapi)
    }

    pub fn from(pipe: RzPipe) -> RzApi {
        RzApi {
            rzp: Arc::new(Mutex::new(pipe)),
            info: Information::default(),
            do_cache: false,
            cache: Rc::new(Cache::new(Self::CACHE_SIZE)),
        }
    }

    /// Memoize the cross-reference queries sent through `ccmd`.
    pub fn set_cache(&mut self, enable: bool) {
        self.do_cache = enable;
    }

    pub fn set_option(&self, key: &str, value: &str) -> Result<String> {
        self.cmd(format!("e {}={}", key, value).as_str())
    }

    pub fn cmd(&self, cmd: &str) -> Result<String> {
        let mut rzp = self.rzp.lock().map_err(|_| RzError::Poisoned)?;
        Ok(rzp.cmd(cmd)?)
    }

    pub fn cmdj<T: serde::de::DeserializeOwned>(&self, cmd: &str) -> Result<T> {
        let json = self.cmd(cmd)?;
        parse_json(&json)
    }

    // rizin prints nothing instead of `[]` for some empty listings
    fn ccmdj_list<T: serde::de::DeserializeOwned>(&self, cmd: &str) -> Result<Vec<T>> {
        let json = self.ccmd(cmd)?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_json(&json)
    }

    pub fn ccmd(&self, cmd: &str) -> Result<String> {
        if self.do_cache {
            if let Some(result) = self.cache.get(cmd) {
                Ok(result)
            } else {
                let result = self.cmd(cmd)?;
                self.cache.insert(cmd.to_owned(), result.clone());
                Ok(result)
            }
        } else {
            self.cmd(cmd)
        }
    }

    pub fn close(&self) {
        let _r = self.cmd("q!");
    }

    // decode 'n' (or 16) instructions at 'offset' (or current position if offset is
    // `None`)
    pub fn get_n_insts(&self, n: Option<u64>, offset: Option<u64>) -> Result<Vec<Instruction>> {
        let n = n.unwrap_or(16);
        let mut cmd = format!("aoj {}", n);
        if let Some(o) = offset {
            cmd = format!("{} @ {}", cmd, o);
        }
        self.cmdj(&cmd)
    }

    /// Decode the single instruction located at `offset`.
    pub fn get_inst(&self, offset: u64) -> Result<Instruction> {
        self.get_n_insts(Some(1), Some(offset))?
            .into_iter()
            .next()
            .ok_or_else(|| RzError::Other(format!("no instruction at {:#x}", offset)))
    }

    /// The function containing `offset`, if analysis found one.
    pub fn get_function_at(&self, offset: u64) -> Result<Option<FunctionInfo>> {
        let funcs: Vec<FunctionInfo> = self.ccmdj_list(&format!("afij @ {}", offset))?;
        Ok(funcs.into_iter().next())
    }

    /// References made by the instruction at `offset`.
    pub fn get_xrefs_from(&self, offset: u64) -> Result<Vec<CrossRef>> {
        self.ccmdj_list(&format!("axfj @ {}", offset))
    }

    /// References pointing at `offset`.
    pub fn get_xrefs_to(&self, offset: u64) -> Result<Vec<CrossRef>> {
        self.ccmdj_list(&format!("axtj @ {}", offset))
    }

    pub fn get_entrypoint(&self) -> Result<Vec<EntryInfo>> {
        self.cmdj("iej")
    }

    pub fn get_info(&self) -> Result<Information> {
        self.cmdj("ij")
    }

    /// All Analysis
    pub fn analyze_all(&self) -> Result<()> {
        self.cmd("aa")?;
        Ok(())
    }
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| RzError::Json(std::any::type_name::<T>().to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instructions() {
        let json = r#"[{"opcode":"jmp 0x8048090","disasm":"jmp 0x8048090","mnemonic":"jmp",
            "jump":134512784,"addr":134512768,"size":5,"type":"jmp","family":"cpu"}]"#;
        let insts: Vec<Instruction> = parse_json(json).unwrap();
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].addr, 0x08048080);
        assert_eq!(insts[0].jump, Some(0x08048090));
        assert_eq!(insts[0].fail, None);
        assert_eq!(insts[0].inst_type, "jmp");
    }

    #[test]
    fn test_parse_entrypoint() {
        let json = r#"[{"vaddr":134512768,"paddr":128,"baddr":134512640,"laddr":0,"haddr":24,"etype":"program"}]"#;
        let entries: Vec<EntryInfo> = parse_json(json).unwrap();
        assert_eq!(entries[0].vaddr, 0x08048080);
    }

    #[test]
    fn test_parse_functions_ignores_missing_fields() {
        let json = r#"[{"offset":134512768,"name":"entry0","size":27}]"#;
        let funcs: Vec<FunctionInfo> = parse_json(json).unwrap();
        assert_eq!(funcs[0].offset, 0x08048080);
        assert_eq!(funcs[0].name, "entry0");
    }

    #[test]
    fn test_parse_xrefs() {
        let json = r#"[{"from":134512800,"type":"CALL","opcode":"call 0x8048080",
            "fcn_addr":134512784,"fcn_name":"main","refname":"entry0"}]"#;
        let xrefs: Vec<CrossRef> = parse_json(json).unwrap();
        assert_eq!(xrefs[0].from, 0x080480a0);
        assert_eq!(xrefs[0].to, 0);
        assert!(xrefs[0].is_code());

        let json = r#"[{"from":134512768,"to":134512896,"type":"DATA"}]"#;
        let xrefs: Vec<CrossRef> = parse_json(json).unwrap();
        assert_eq!(xrefs[0].to, 0x08048100);
        assert!(!xrefs[0].is_code());
    }

    #[test]
    fn test_parse_mismatch() {
        let result: Result<Vec<EntryInfo>> = parse_json(r#"{"vaddr":"oops"}"#);
        assert!(matches!(result, Err(RzError::Json(_, _))));
    }
}
