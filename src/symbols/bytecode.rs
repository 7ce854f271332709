use regex::Regex;
use std::sync::LazyLock;

/// Pattern: `functionName:[url:entry|packageName|version|filePath:line:col]`
/// The function name is matched non-greedily so names containing `:` still
/// split at the source-map bracket.
static BYTECODE_SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<func>.*?):\[url:(?P<entry>[^|\]]*)\|(?P<pkg>[^|\]]*)\|(?P<ver>[^|\]]*)\|(?P<path>[^\]]*?):(?P<line>\d+):(?P<col>\d+)\]$",
    )
    .expect("Invalid bytecode symbol regex pattern")
});

/// A managed bytecode symbol with its embedded source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeSymbol {
    pub function_name: String,
    pub entry: String,
    pub package_name: String,
    pub version: String,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
}

impl BytecodeSymbol {
    pub fn parse(symbol: &str) -> Option<Self> {
        let caps = BYTECODE_SYMBOL_RE.captures(symbol)?;
        Some(Self {
            function_name: caps["func"].to_string(),
            entry: caps["entry"].to_string(),
            package_name: caps["pkg"].to_string(),
            version: caps["ver"].to_string(),
            file_path: caps["path"].to_string(),
            line: caps["line"].parse().ok()?,
            column: caps["col"].parse().ok()?,
        })
    }

    /// Logical file name: `packageName/version/filePath`, skipping empty parts.
    pub fn logical_file(&self) -> String {
        [
            self.package_name.as_str(),
            self.version.as_str(),
            self.file_path.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
    }
}
