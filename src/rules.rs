/// Extraction rules: ordered candidate locations per field, loaded from JSON.
///
/// The site's markup changes often, so the selector tables live in
/// `rules/site.json` and are compiled here into `scraper` selectors.
use crate::error::{Result, ScrapeError};
use regex::Regex;
use scraper::Selector;
use serde::Deserialize;

const BUILTIN_RULES: &str = include_str!("../rules/site.json");

/// Where a candidate value is read from
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Source {
    #[default]
    Text,
    Attr(String),
}

impl TryFrom<String> for Source {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "text" => Ok(Source::Text),
            other => match other.strip_prefix("attr:") {
                Some(name) if !name.is_empty() => Ok(Source::Attr(name.to_string())),
                _ => Err(format!("unknown source '{}'", value)),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeDef {
    anchor: String,
    #[serde(default)]
    ancestor: Option<String>,
    #[serde(default)]
    item: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrategyDef {
    #[serde(default)]
    scope: Option<ScopeDef>,
    selector: String,
    #[serde(default)]
    source: Source,
    #[serde(default)]
    strip_prefix: Option<String>,
    #[serde(default)]
    skip_if_has: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldDef {
    field: String,
    strategies: Vec<StrategyDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoginDef {
    present: Vec<String>,
    absent: Vec<String>,
    threshold: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct LayoutDef {
    #[serde(default)]
    marker: Option<String>,
    container: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FlagDef {
    field: String,
    selector: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchDef {
    layouts: Vec<LayoutDef>,
    link: Vec<StrategyDef>,
    fields: Vec<FieldDef>,
    flags: Vec<FlagDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct RulesDef {
    profile: Vec<FieldDef>,
    login: LoginDef,
    search: SearchDef,
}

/// Narrows the search root before a strategy's selector runs
#[derive(Debug, Clone)]
pub struct Scope {
    pub anchor: Selector,
    pub ancestor: Option<String>,
    pub item: Option<Selector>,
}

#[derive(Debug, Clone)]
pub struct Strategy {
    pub scope: Option<Scope>,
    pub selector: Selector,
    pub source: Source,
    pub strip_prefix: Option<String>,
    pub skip_if_has: Option<Selector>,
    pub pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: String,
    pub strategies: Vec<Strategy>,
}

#[derive(Debug, Clone)]
pub struct LoginRule {
    pub present: Vec<Selector>,
    pub absent: Vec<Selector>,
    pub threshold: usize,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub marker: Option<Selector>,
    pub container: Selector,
}

#[derive(Debug, Clone)]
pub struct FlagRule {
    pub field: String,
    pub selector: Selector,
}

#[derive(Debug, Clone)]
pub struct SearchRules {
    pub layouts: Vec<Layout>,
    pub link: Vec<Strategy>,
    pub fields: Vec<FieldRule>,
    pub flags: Vec<FlagRule>,
}

/// Compiled rule set used by the extractor and the search lister
#[derive(Debug, Clone)]
pub struct Rules {
    pub profile: Vec<FieldRule>,
    pub login: LoginRule,
    pub search: SearchRules,
}

impl Rules {
    /// Rules bundled with the extension
    pub fn builtin() -> Result<Rules> {
        Rules::from_json(BUILTIN_RULES)
    }

    pub fn from_json(json: &str) -> Result<Rules> {
        let def: RulesDef = serde_json::from_str(json)
            .map_err(|e| ScrapeError::Rules(e.to_string()))?;

        Ok(Rules {
            profile: compile_fields(&def.profile)?,
            login: LoginRule {
                present: compile_all(&def.login.present)?,
                absent: compile_all(&def.login.absent)?,
                threshold: def.login.threshold,
            },
            search: SearchRules {
                layouts: def
                    .search
                    .layouts
                    .iter()
                    .map(|l| {
                        Ok(Layout {
                            marker: l.marker.as_deref().map(compile).transpose()?,
                            container: compile(&l.container)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                link: def.search.link.iter().map(compile_strategy).collect::<Result<Vec<_>>>()?,
                fields: compile_fields(&def.search.fields)?,
                flags: def
                    .search
                    .flags
                    .iter()
                    .map(|f| {
                        Ok(FlagRule {
                            field: f.field.clone(),
                            selector: compile(&f.selector)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            },
        })
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::Rules(format!("{}: {:?}", selector, e)))
}

fn compile_all(selectors: &[String]) -> Result<Vec<Selector>> {
    selectors.iter().map(|s| compile(s)).collect()
}

fn compile_fields(defs: &[FieldDef]) -> Result<Vec<FieldRule>> {
    defs.iter()
        .map(|def| {
            Ok(FieldRule {
                field: def.field.clone(),
                strategies: def.strategies.iter().map(compile_strategy).collect::<Result<Vec<_>>>()?,
            })
        })
        .collect()
}

fn compile_strategy(def: &StrategyDef) -> Result<Strategy> {
    let scope = match &def.scope {
        Some(scope) => Some(Scope {
            anchor: compile(&scope.anchor)?,
            ancestor: scope.ancestor.as_ref().map(|tag| tag.to_ascii_lowercase()),
            item: scope.item.as_deref().map(compile).transpose()?,
        }),
        None => None,
    };

    let pattern = def
        .pattern
        .as_deref()
        .map(|p| Regex::new(p).map_err(|e| ScrapeError::Rules(format!("{}: {}", p, e))))
        .transpose()?;

    Ok(Strategy {
        scope,
        selector: compile(&def.selector)?,
        source: def.source.clone(),
        strip_prefix: def.strip_prefix.clone(),
        skip_if_has: def.skip_if_has.as_deref().map(compile).transpose()?,
        pattern,
    })
}
