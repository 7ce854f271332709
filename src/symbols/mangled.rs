/// Prefix of native multiplatform function symbols.
pub const MANGLE_PREFIX: &str = "kfun:";

/// A demangled native multiplatform function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangledSymbol {
    pub package: String,
    pub class_name: String,
    /// The original symbol text, kept for display.
    pub full_name: String,
}

impl MangledSymbol {
    /// Parse `kfun:packagePath#memberSignature`.
    ///
    /// The package is the language root package when the path has no dot,
    /// otherwise the longest declared module that prefixes the path on a dot
    /// boundary, otherwise the first four path segments.
    pub fn parse(symbol: &str, modules: &[String], root_package: &str) -> Option<Self> {
        let rest = symbol.strip_prefix(MANGLE_PREFIX)?;
        let package_path = match rest.split_once('#') {
            Some((path, _member)) => path,
            None => rest,
        };

        let package = if !package_path.contains('.') {
            root_package.to_string()
        } else {
            longest_module(package_path, modules)
                .map(str::to_string)
                .unwrap_or_else(|| package_path.split('.').take(4).collect::<Vec<_>>().join("."))
        };

        let class_name = package_path
            .rsplit('.')
            .next()
            .unwrap_or(package_path)
            .to_string();

        Some(Self {
            package,
            class_name,
            full_name: symbol.to_string(),
        })
    }
}

fn longest_module<'a>(package_path: &str, modules: &'a [String]) -> Option<&'a str> {
    modules
        .iter()
        .filter(|m| {
            package_path == m.as_str()
                || (package_path.starts_with(m.as_str())
                    && package_path.as_bytes().get(m.len()) == Some(&b'.'))
        })
        .max_by_key(|m| m.len())
        .map(String::as_str)
}
