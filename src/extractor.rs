/// Page data extraction: turns a page snapshot into a contact record
use crate::contact::{fields, iso_timestamp, ContactRecord, PageSnapshot};
use crate::error::{Result, ScrapeError};
use crate::rules::{FieldRule, LoginRule, Rules, Scope, Source, Strategy};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use url::Url;

/// Extract a full profile record from a profile page.
///
/// Every field is optional except that at least one of `name` or `title`
/// must resolve.
pub fn extract_profile(rules: &Rules, snapshot: &PageSnapshot, now: DateTime<Utc>) -> Result<ContactRecord> {
    let document = Html::parse_document(&snapshot.html);
    let base = Url::parse(&snapshot.url).ok();

    let mut record = ContactRecord::with_profile_url(snapshot.url.clone());
    apply_fields(&mut record, &rules.profile, document.root_element(), base.as_ref());

    if !record.contains(fields::NAME) && !record.contains(fields::TITLE) {
        return Err(ScrapeError::Extraction {
            url: snapshot.url.clone(),
        });
    }

    record.set_text(fields::SCRAPED_AT, iso_timestamp(now));
    record.set_text(fields::PAGE_TYPE, "profile");
    Ok(record)
}

/// Whether the snapshot looks like a logged-in session
pub fn is_logged_in(rule: &LoginRule, snapshot: &PageSnapshot) -> bool {
    let document = Html::parse_document(&snapshot.html);

    let present = rule
        .present
        .iter()
        .filter(|sel| document.select(sel).next().is_some())
        .count();
    let absent = rule
        .absent
        .iter()
        .filter(|sel| document.select(sel).next().is_none())
        .count();

    present + absent >= rule.threshold
}

/// Resolve each field rule against `root` and set the ones that yield a value
pub(crate) fn apply_fields(record: &mut ContactRecord, rules: &[FieldRule], root: ElementRef, base: Option<&Url>) {
    for rule in rules {
        if let Some(value) = first_value(&rule.strategies, root, base) {
            record.set_text(&rule.field, value);
        }
    }
}

/// First non-empty value produced by the strategies, tried in order
pub(crate) fn first_value(strategies: &[Strategy], root: ElementRef, base: Option<&Url>) -> Option<String> {
    strategies.iter().find_map(|strategy| {
        let scoped = match &strategy.scope {
            Some(scope) => resolve_scope(scope, root)?,
            None => root,
        };

        scoped
            .select(&strategy.selector)
            .find_map(|element| candidate_value(strategy, element, base))
    })
}

fn resolve_scope<'a>(scope: &Scope, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let anchor = root.select(&scope.anchor).next()?;

    let container = match &scope.ancestor {
        Some(tag) => std::iter::once(anchor)
            .chain(anchor.ancestors().filter_map(ElementRef::wrap))
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))?,
        None => anchor,
    };

    match &scope.item {
        Some(item) => container.select(item).next(),
        None => Some(container),
    }
}

fn candidate_value(strategy: &Strategy, element: ElementRef, base: Option<&Url>) -> Option<String> {
    if let Some(skip) = &strategy.skip_if_has {
        if element.select(skip).next().is_some() {
            return None;
        }
    }

    let raw = match &strategy.source {
        Source::Text => element.text().collect::<String>(),
        Source::Attr(name) => {
            let value = element.value().attr(name)?;
            if matches!(name.as_str(), "href" | "src") {
                resolve_link(value, base)
            } else {
                value.to_string()
            }
        }
    };

    let stripped = match &strategy.strip_prefix {
        Some(prefix) => raw.strip_prefix(prefix.as_str()).unwrap_or(&raw),
        None => raw.as_str(),
    };

    let value = stripped.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(pattern) = &strategy.pattern {
        if !pattern.is_match(value) {
            return None;
        }
    }

    Some(value.to_string())
}

/// Resolve a link the way the browser reports `element.href`
fn resolve_link(value: &str, base: Option<&Url>) -> String {
    let value = value.trim();
    match base {
        Some(base) => base
            .join(value)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}
