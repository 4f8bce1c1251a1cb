use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single option value as seen through the name-based `get`/`set` contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
    Null,
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::List(items) => write!(f, "{:?}", items),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<usize>> for OptionValue {
    fn from(value: Option<usize>) -> Self {
        value.map_or(Self::Null, |v| Self::Int(to_i64(v)))
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

macro_rules! option_names {
    ($($variant:ident => $name:literal,)+) => {
        /// Every option the engine understands
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum OptionName {
            $($variant,)+
        }

        impl OptionName {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for OptionName {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(Error::config(s, "unknown option")),
                }
            }
        }
    };
}

option_names! {
    DirsOnly => "dirsonly",
    FilesOnly => "filesonly",
    Recursive => "recursive",
    Hidden => "hidden",
    Simulate => "simulate",
    Interactive => "interactive",
    Prompt => "prompt",
    NoClobber => "noclobber",
    KeepExt => "keepext",
    Regex => "regex",
    IgnoreCase => "ignorecase",
    Exclude => "exclude",
    AutoStop => "autostop",
    Mirror => "mirror",
    CapitalizeCheck => "capitalizecheck",
    CapitalizeMode => "capitalizemode",
    Lower => "lower",
    Upper => "upper",
    SpaceCheck => "spacecheck",
    SpaceMode => "spacemode",
    Accents => "accents",
    ReplaceCheck => "replacecheck",
    SourceEdit => "sourceedit",
    TargetEdit => "targetedit",
    InsertCheck => "insertcheck",
    InsertPos => "insertpos",
    InsertEdit => "insertedit",
    DeleteCheck => "deletecheck",
    DeleteStart => "deletestart",
    DeleteEnd => "deleteend",
    CountCheck => "countcheck",
    CountBase => "countbase",
    CountFill => "countfill",
    CountPreEdit => "countpreedit",
    CountSufEdit => "countsufedit",
    CountPos => "countpos",
    RemNonWords => "remnonwords",
    RemDups => "remdups",
    RemExt => "remext",
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed option values read by the discoverer, pipeline and executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options {
    /// Only directories are targets
    pub dirsonly: bool,
    /// Only files are targets
    pub filesonly: bool,
    /// Descend below the root directory
    pub recursive: bool,
    /// Include entries whose name starts with a dot
    pub hidden: bool,
    /// Report what commit would do without touching the filesystem
    pub simulate: bool,
    /// Ask the confirmation capability before overwriting
    pub interactive: bool,
    /// Ask the confirmation capability before every rename
    pub prompt: bool,
    /// Never overwrite an existing destination
    pub noclobber: bool,
    /// Exclude the extension from matching and transformation
    pub keepext: bool,
    /// Treat the source pattern as a regular expression
    pub regex: bool,
    pub ignorecase: bool,
    /// Globs for names that discovery skips
    pub exclude: Vec<String>,
    /// Abort the remaining batch on the first error
    pub autostop: bool,
    pub mirror: bool,
    pub capitalizecheck: bool,
    /// 0 = upper, 1 = lower, 2 = first letter, 3 = each word
    pub capitalizemode: u8,
    pub lower: bool,
    pub upper: bool,
    pub spacecheck: bool,
    /// 0 = ` `→`_`, 1 = `_`→` `, 2 = ` `→`.`, 3 = `.`→` `, 4 = ` `→`-`, 5 = `-`→` `
    pub spacemode: u8,
    pub accents: bool,
    pub replacecheck: bool,
    pub sourceedit: String,
    pub targetedit: String,
    pub insertcheck: bool,
    pub insertpos: usize,
    pub insertedit: String,
    pub deletecheck: bool,
    pub deletestart: usize,
    pub deleteend: usize,
    pub countcheck: bool,
    pub countbase: u64,
    /// Zero-pad the counter: 9 becomes 09 when the batch reaches 10
    pub countfill: bool,
    pub countpreedit: String,
    pub countsufedit: String,
    /// Counter insert position, appended when unset
    pub countpos: Option<usize>,
    pub remnonwords: bool,
    pub remdups: bool,
    pub remext: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dirsonly: false,
            filesonly: false,
            recursive: false,
            hidden: false,
            simulate: false,
            interactive: false,
            prompt: false,
            noclobber: false,
            keepext: false,
            regex: false,
            ignorecase: false,
            exclude: Vec::new(),
            autostop: false,
            mirror: false,
            capitalizecheck: false,
            capitalizemode: 0,
            lower: false,
            upper: false,
            spacecheck: false,
            spacemode: 0,
            accents: false,
            replacecheck: true,
            sourceedit: String::new(),
            targetedit: String::new(),
            insertcheck: false,
            insertpos: 0,
            insertedit: String::new(),
            deletecheck: false,
            deletestart: 0,
            deleteend: 1,
            countcheck: false,
            countbase: 1,
            countfill: true,
            countpreedit: String::new(),
            countsufedit: String::new(),
            countpos: None,
            remnonwords: false,
            remdups: false,
            remext: false,
        }
    }
}

impl Options {
    /// Read one option through the name-based contract
    pub fn value(&self, name: OptionName) -> OptionValue {
        use OptionName as N;

        match name {
            N::DirsOnly => self.dirsonly.into(),
            N::FilesOnly => self.filesonly.into(),
            N::Recursive => self.recursive.into(),
            N::Hidden => self.hidden.into(),
            N::Simulate => self.simulate.into(),
            N::Interactive => self.interactive.into(),
            N::Prompt => self.prompt.into(),
            N::NoClobber => self.noclobber.into(),
            N::KeepExt => self.keepext.into(),
            N::Regex => self.regex.into(),
            N::IgnoreCase => self.ignorecase.into(),
            N::Exclude => self.exclude.clone().into(),
            N::AutoStop => self.autostop.into(),
            N::Mirror => self.mirror.into(),
            N::CapitalizeCheck => self.capitalizecheck.into(),
            N::CapitalizeMode => i64::from(self.capitalizemode).into(),
            N::Lower => self.lower.into(),
            N::Upper => self.upper.into(),
            N::SpaceCheck => self.spacecheck.into(),
            N::SpaceMode => i64::from(self.spacemode).into(),
            N::Accents => self.accents.into(),
            N::ReplaceCheck => self.replacecheck.into(),
            N::SourceEdit => self.sourceedit.clone().into(),
            N::TargetEdit => self.targetedit.clone().into(),
            N::InsertCheck => self.insertcheck.into(),
            N::InsertPos => to_i64(self.insertpos).into(),
            N::InsertEdit => self.insertedit.clone().into(),
            N::DeleteCheck => self.deletecheck.into(),
            N::DeleteStart => to_i64(self.deletestart).into(),
            N::DeleteEnd => to_i64(self.deleteend).into(),
            N::CountCheck => self.countcheck.into(),
            N::CountBase => i64::try_from(self.countbase).unwrap_or(i64::MAX).into(),
            N::CountFill => self.countfill.into(),
            N::CountPreEdit => self.countpreedit.clone().into(),
            N::CountSufEdit => self.countsufedit.clone().into(),
            N::CountPos => self.countpos.into(),
            N::RemNonWords => self.remnonwords.into(),
            N::RemDups => self.remdups.into(),
            N::RemExt => self.remext.into(),
        }
    }

    /// Write one option, checking the value's type and range
    fn assign(&mut self, name: OptionName, value: OptionValue) -> Result<()> {
        use OptionName as N;

        match name {
            N::DirsOnly => {
                self.dirsonly = expect_bool(name, value)?;
                if self.dirsonly {
                    self.filesonly = false;
                }
            },
            N::FilesOnly => {
                self.filesonly = expect_bool(name, value)?;
                if self.filesonly {
                    self.dirsonly = false;
                }
            },
            N::Recursive => self.recursive = expect_bool(name, value)?,
            N::Hidden => self.hidden = expect_bool(name, value)?,
            N::Simulate => self.simulate = expect_bool(name, value)?,
            N::Interactive => self.interactive = expect_bool(name, value)?,
            N::Prompt => self.prompt = expect_bool(name, value)?,
            N::NoClobber => self.noclobber = expect_bool(name, value)?,
            N::KeepExt => self.keepext = expect_bool(name, value)?,
            N::Regex => self.regex = expect_bool(name, value)?,
            N::IgnoreCase => self.ignorecase = expect_bool(name, value)?,
            N::Exclude => self.exclude = expect_list(name, value)?,
            N::AutoStop => self.autostop = expect_bool(name, value)?,
            N::Mirror => self.mirror = expect_bool(name, value)?,
            N::CapitalizeCheck => self.capitalizecheck = expect_bool(name, value)?,
            N::CapitalizeMode => self.capitalizemode = expect_mode(name, value, 3)?,
            N::Lower => self.lower = expect_bool(name, value)?,
            N::Upper => self.upper = expect_bool(name, value)?,
            N::SpaceCheck => self.spacecheck = expect_bool(name, value)?,
            N::SpaceMode => self.spacemode = expect_mode(name, value, 5)?,
            N::Accents => self.accents = expect_bool(name, value)?,
            N::ReplaceCheck => self.replacecheck = expect_bool(name, value)?,
            N::SourceEdit => self.sourceedit = expect_text(name, value)?,
            N::TargetEdit => self.targetedit = expect_text(name, value)?,
            N::InsertCheck => self.insertcheck = expect_bool(name, value)?,
            N::InsertPos => self.insertpos = expect_index(name, value)?,
            N::InsertEdit => self.insertedit = expect_text(name, value)?,
            N::DeleteCheck => self.deletecheck = expect_bool(name, value)?,
            N::DeleteStart => self.deletestart = expect_index(name, value)?,
            N::DeleteEnd => self.deleteend = expect_index(name, value)?,
            N::CountCheck => self.countcheck = expect_bool(name, value)?,
            N::CountBase => {
                let base = expect_non_negative(name, value)?;
                self.countbase = u64::try_from(base)
                    .map_err(|_| Error::config(name.as_str(), "value out of range"))?;
            },
            N::CountFill => self.countfill = expect_bool(name, value)?,
            N::CountPreEdit => self.countpreedit = expect_text(name, value)?,
            N::CountSufEdit => self.countsufedit = expect_text(name, value)?,
            N::CountPos => {
                self.countpos = match value {
                    OptionValue::Null => None,
                    other => Some(expect_index(name, other)?),
                }
            },
            N::RemNonWords => self.remnonwords = expect_bool(name, value)?,
            N::RemDups => self.remdups = expect_bool(name, value)?,
            N::RemExt => self.remext = expect_bool(name, value)?,
        }

        Ok(())
    }

    /// Cross-field rules checked against the would-be state of every `set`
    pub fn validate(&self) -> Result<()> {
        if self.dirsonly && self.filesonly {
            return Err(Error::config(
                "filesonly",
                "dirsonly and filesonly are mutually exclusive",
            ));
        }
        if self.deleteend < self.deletestart {
            return Err(Error::config(
                "deleteend",
                format!(
                    "deleteend ({}) must not be smaller than deletestart ({})",
                    self.deleteend, self.deletestart
                ),
            ));
        }
        for pattern in &self.exclude {
            globset::Glob::new(pattern)
                .map_err(|e| Error::config("exclude", format!("bad glob '{}': {}", pattern, e)))?;
        }
        Ok(())
    }
}

fn type_error(name: OptionName, expected: &str, got: &OptionValue) -> Error {
    Error::config(name.as_str(), format!("expected {}, got {}", expected, got))
}

fn expect_bool(name: OptionName, value: OptionValue) -> Result<bool> {
    match value {
        OptionValue::Bool(b) => Ok(b),
        other => Err(type_error(name, "a boolean", &other)),
    }
}

fn expect_text(name: OptionName, value: OptionValue) -> Result<String> {
    match value {
        OptionValue::Text(s) => Ok(s),
        other => Err(type_error(name, "a string", &other)),
    }
}

fn expect_list(name: OptionName, value: OptionValue) -> Result<Vec<String>> {
    match value {
        OptionValue::List(items) => Ok(items),
        OptionValue::Text(s) if s.is_empty() => Ok(Vec::new()),
        OptionValue::Text(s) => Ok(vec![s]),
        OptionValue::Null => Ok(Vec::new()),
        other => Err(type_error(name, "a list of globs", &other)),
    }
}

fn expect_non_negative(name: OptionName, value: OptionValue) -> Result<i64> {
    match value {
        OptionValue::Int(i) if i >= 0 => Ok(i),
        other => Err(type_error(name, "a non-negative integer", &other)),
    }
}

fn expect_index(name: OptionName, value: OptionValue) -> Result<usize> {
    let i = expect_non_negative(name, value)?;
    usize::try_from(i).map_err(|_| Error::config(name.as_str(), "value out of range"))
}

fn expect_mode(name: OptionName, value: OptionValue, max: u8) -> Result<u8> {
    let i = expect_non_negative(name, value)?;
    match u8::try_from(i) {
        Ok(mode) if mode <= max => Ok(mode),
        _ => Err(Error::config(
            name.as_str(),
            format!("mode must be between 0 and {}, got {}", max, i),
        )),
    }
}

/// The engine's option state plus the defaults frozen at construction
#[derive(Debug, Clone)]
pub struct OptionSet {
    current: Options,
    defaults: Options,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl OptionSet {
    /// Freeze `initial` as the defaults `restore` returns to
    pub fn new(initial: Options) -> Self {
        Self {
            defaults: initial.clone(),
            current: initial,
        }
    }

    pub fn options(&self) -> &Options {
        &self.current
    }

    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Read the named options, or every option when `names` is empty
    pub fn get(&self, names: &[&str]) -> Result<BTreeMap<String, OptionValue>> {
        let selected: Vec<OptionName> = if names.is_empty() {
            OptionName::ALL.to_vec()
        } else {
            names
                .iter()
                .map(|n| n.parse())
                .collect::<Result<Vec<_>>>()?
        };

        Ok(selected
            .into_iter()
            .map(|name| (name.as_str().to_string(), self.current.value(name)))
            .collect())
    }

    /// Validate and apply a batch of values; nothing changes if any value is rejected.
    ///
    /// Returns the options whose value actually changed.
    pub fn set<I, K>(&mut self, values: I) -> Result<Vec<(OptionName, OptionValue)>>
    where
        I: IntoIterator<Item = (K, OptionValue)>,
        K: AsRef<str>,
    {
        let mut candidate = self.current.clone();
        let mut touched = Vec::new();
        let mut exclusive_enabled = 0;

        for (key, value) in values {
            let name: OptionName = key.as_ref().parse()?;
            if touched.contains(&name) {
                return Err(Error::config(name.as_str(), "option given twice"));
            }
            if matches!(name, OptionName::DirsOnly | OptionName::FilesOnly)
                && value == OptionValue::Bool(true)
            {
                exclusive_enabled += 1;
                if exclusive_enabled > 1 {
                    return Err(Error::config(
                        name.as_str(),
                        "dirsonly and filesonly cannot both be enabled",
                    ));
                }
            }
            candidate.assign(name, value)?;
            touched.push(name);
        }

        candidate.validate()?;

        let changed = OptionName::ALL
            .iter()
            .copied()
            .filter(|&name| self.current.value(name) != candidate.value(name))
            .map(|name| (name, candidate.value(name)))
            .collect();

        self.current = candidate;
        Ok(changed)
    }

    /// Reset every option to the value frozen at construction
    pub fn restore(&mut self) {
        self.current = self.defaults.clone();
    }
}
