use crate::options::Options;
use crate::scanner::Target;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseMode {
    Upper,
    Lower,
    /// First character upper, the rest lower
    CapitalizeFirst,
    /// Every whitespace-separated word capitalized
    CapitalizeWords,
}

impl CaseMode {
    pub fn from_index(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::Upper),
            1 => Some(Self::Lower),
            2 => Some(Self::CapitalizeFirst),
            3 => Some(Self::CapitalizeWords),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpacingMode {
    SpaceToUnderscore,
    UnderscoreToSpace,
    SpaceToDot,
    DotToSpace,
    SpaceToHyphen,
    HyphenToSpace,
}

impl SpacingMode {
    pub fn from_index(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::SpaceToUnderscore),
            1 => Some(Self::UnderscoreToSpace),
            2 => Some(Self::SpaceToDot),
            3 => Some(Self::DotToSpace),
            4 => Some(Self::SpaceToHyphen),
            5 => Some(Self::HyphenToSpace),
            _ => None,
        }
    }

    fn pair(self) -> (char, char) {
        match self {
            Self::SpaceToUnderscore => (' ', '_'),
            Self::UnderscoreToSpace => ('_', ' '),
            Self::SpaceToDot => (' ', '.'),
            Self::DotToSpace => ('.', ' '),
            Self::SpaceToHyphen => (' ', '-'),
            Self::HyphenToSpace => ('-', ' '),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub base: u64,
    pub fill: bool,
    pub prefix: String,
    pub suffix: String,
    /// Character index to insert at; appended when unset
    pub position: Option<usize>,
}

impl Counter {
    /// Render the counter for the target at `index` in a batch of `total`
    pub fn render(&self, index: usize, total: usize) -> String {
        let value = self.base.saturating_add(index as u64);
        let number = if self.fill {
            let largest = self.base.saturating_add(total.saturating_sub(1) as u64);
            let width = digits(largest).max(2);
            format!("{:0width$}", value, width = width)
        } else {
            value.to_string()
        };
        format!("{}{}{}", self.prefix, number, self.suffix)
    }
}

fn digits(mut n: u64) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// One name-transformation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum TransformStage {
    /// Replace the stem; each `*` expands to the current stem
    Template { text: String },
    Case { mode: CaseMode },
    Spacing { mode: SpacingMode },
    AccentStrip,
    FindReplace { source: String, target: String },
    Insert { position: usize, text: String },
    DeleteRange { start: usize, end: usize },
    Counter(Counter),
    RemoveNonWord,
    RemoveDuplicateRuns,
    StripExtension,
}

impl TransformStage {
    /// Position in the fixed application order
    fn rank(&self) -> u8 {
        match self {
            Self::Template { .. } => 0,
            Self::Case { .. } => 1,
            Self::Spacing { .. } => 2,
            Self::AccentStrip => 3,
            Self::FindReplace { .. } => 4,
            Self::Insert { .. } => 5,
            Self::DeleteRange { .. } => 6,
            Self::Counter(_) => 7,
            Self::RemoveNonWord => 8,
            Self::RemoveDuplicateRuns => 9,
            Self::StripExtension => 10,
        }
    }
}

/// The name being transformed: stem and extension are tracked apart
struct Working {
    stem: String,
    /// Extension text after the dot; `None` when the name has no extension
    ext: Option<String>,
    original_ext: Option<String>,
    /// Character-wise stages leave the extension alone
    frozen: bool,
    stripped: bool,
}

impl Working {
    fn new(target: &Target, keepext: bool) -> Self {
        let ext = target
            .extension
            .strip_prefix('.')
            .map(ToString::to_string);
        Self {
            stem: target.name.clone(),
            original_ext: ext.clone(),
            ext,
            frozen: keepext,
            stripped: false,
        }
    }

    /// Apply `f` to the stem and, unless frozen, to the extension text
    fn map_chars(&mut self, f: impl Fn(&str) -> String) {
        self.stem = f(&self.stem);
        if !self.frozen {
            if let Some(ext) = self.ext.as_mut() {
                *ext = f(ext);
            }
        }
    }

    fn finish(self) -> String {
        match (self.stripped, self.ext, self.original_ext) {
            (false, Some(ext), Some(original)) if !ext.is_empty() || original.is_empty() => {
                format!("{}.{}", self.stem, ext)
            },
            _ => self.stem,
        }
    }
}

/// An ordered set of enabled stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<TransformStage>,
    keepext: bool,
}

impl Pipeline {
    /// Build a pipeline; stages are sorted into the fixed application order
    pub fn new(mut stages: Vec<TransformStage>, keepext: bool) -> Self {
        stages.sort_by_key(TransformStage::rank);
        Self { stages, keepext }
    }

    /// Derive the pipeline from the enabled transform options
    pub fn from_options(options: &Options, template: Option<&str>) -> Self {
        let mut stages = Vec::new();

        if let Some(text) = template {
            stages.push(TransformStage::Template {
                text: text.to_string(),
            });
        }

        let case = if options.capitalizecheck {
            CaseMode::from_index(options.capitalizemode)
        } else if options.upper {
            Some(CaseMode::Upper)
        } else if options.lower {
            Some(CaseMode::Lower)
        } else {
            None
        };
        if let Some(mode) = case {
            stages.push(TransformStage::Case { mode });
        }

        if options.spacecheck {
            if let Some(mode) = SpacingMode::from_index(options.spacemode) {
                stages.push(TransformStage::Spacing { mode });
            }
        }
        if options.accents {
            stages.push(TransformStage::AccentStrip);
        }
        if options.replacecheck && !options.sourceedit.is_empty() {
            stages.push(TransformStage::FindReplace {
                source: options.sourceedit.clone(),
                target: options.targetedit.clone(),
            });
        }
        if options.insertcheck {
            stages.push(TransformStage::Insert {
                position: options.insertpos,
                text: options.insertedit.clone(),
            });
        }
        if options.deletecheck {
            stages.push(TransformStage::DeleteRange {
                start: options.deletestart,
                end: options.deleteend,
            });
        }
        if options.countcheck {
            stages.push(TransformStage::Counter(Counter {
                base: options.countbase,
                fill: options.countfill,
                prefix: options.countpreedit.clone(),
                suffix: options.countsufedit.clone(),
                position: options.countpos,
            }));
        }
        if options.remnonwords {
            stages.push(TransformStage::RemoveNonWord);
        }
        if options.remdups {
            stages.push(TransformStage::RemoveDuplicateRuns);
        }
        if options.remext {
            stages.push(TransformStage::StripExtension);
        }

        Self::new(stages, options.keepext)
    }

    pub fn stages(&self) -> &[TransformStage] {
        &self.stages
    }

    pub fn keepext(&self) -> bool {
        self.keepext
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Compute the new file name for the target at `index` in a batch of `total`
    pub fn apply(&self, target: &Target, index: usize, total: usize) -> String {
        let mut w = Working::new(target, self.keepext);

        for stage in &self.stages {
            match stage {
                TransformStage::Template { text } => {
                    w.stem = text.replace('*', &w.stem);
                },
                TransformStage::Case { mode } => {
                    let mode = *mode;
                    w.stem = change_case(&w.stem, mode);
                    if !w.frozen {
                        if let Some(ext) = w.ext.as_mut() {
                            // The extension never starts a word
                            *ext = match mode {
                                CaseMode::Upper => ext.to_uppercase(),
                                _ => ext.to_lowercase(),
                            };
                        }
                    }
                },
                TransformStage::Spacing { mode } => {
                    let (from, to) = mode.pair();
                    w.map_chars(|s| s.replace(from, &to.to_string()));
                },
                TransformStage::AccentStrip => w.map_chars(strip_accents),
                TransformStage::FindReplace { source, target } => {
                    find_replace(&mut w, source, target);
                },
                TransformStage::Insert { position, text } => {
                    w.stem = insert_at(&w.stem, *position, text);
                },
                TransformStage::DeleteRange { start, end } => {
                    w.stem = delete_range(&w.stem, *start, *end);
                },
                TransformStage::Counter(counter) => {
                    let rendered = counter.render(index, total);
                    w.stem = match counter.position {
                        Some(pos) => insert_at(&w.stem, pos, &rendered),
                        None => format!("{}{}", w.stem, rendered),
                    };
                },
                TransformStage::RemoveNonWord => w.map_chars(remove_non_word),
                TransformStage::RemoveDuplicateRuns => w.map_chars(remove_duplicate_runs),
                TransformStage::StripExtension => w.stripped = true,
            }
        }

        w.finish()
    }

    /// Transform a whole batch; counters follow the slice order
    pub fn apply_all(&self, targets: &[Target]) -> Vec<String> {
        let total = targets.len();
        targets
            .iter()
            .enumerate()
            .map(|(index, target)| self.apply(target, index, total))
            .collect()
    }
}

/// Literal replacement over the full name when the extension is not frozen
fn find_replace(w: &mut Working, source: &str, target: &str) {
    if w.frozen || w.ext.is_none() {
        w.stem = w.stem.replace(source, target);
        return;
    }

    let full = format!("{}.{}", w.stem, w.ext.as_deref().unwrap_or_default());
    let replaced = full.replace(source, target);
    if replaced == full {
        return;
    }
    // Re-split so a replacement touching the dot moves the boundary
    match replaced.rfind('.') {
        Some(idx) if idx > 0 => {
            w.ext = Some(replaced[idx + 1..].to_string());
            w.stem = replaced[..idx].to_string();
        },
        _ => {
            w.stem = replaced;
            w.ext = None;
        },
    }
}

pub fn change_case(s: &str, mode: CaseMode) -> String {
    match mode {
        CaseMode::Upper => s.to_uppercase(),
        CaseMode::Lower => s.to_lowercase(),
        CaseMode::CapitalizeFirst => capitalize(s),
        CaseMode::CapitalizeWords => s.split_whitespace().map(capitalize).collect::<Vec<_>>().join(" "),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Canonical decomposition with combining marks dropped; not recomposed
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

pub fn insert_at(s: &str, position: usize, text: &str) -> String {
    let byte = s.char_indices().nth(position).map_or(s.len(), |(i, _)| i);
    let mut out = String::with_capacity(s.len() + text.len());
    out.push_str(&s[..byte]);
    out.push_str(text);
    out.push_str(&s[byte..]);
    out
}

/// Remove the characters in `[start, end)`, clamped to the string
pub fn delete_range(s: &str, start: usize, end: usize) -> String {
    s.chars()
        .enumerate()
        .filter(|(i, _)| *i < start || *i >= end)
        .map(|(_, c)| c)
        .collect()
}

pub fn remove_non_word(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

pub fn remove_duplicate_runs(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars.dedup();
    chars.into_iter().collect()
}
