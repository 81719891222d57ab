/// Search result listing: builds the bulk queue from a search page
use crate::contact::{fields, iso_timestamp, ContactRecord, PageSnapshot, PageType};
use crate::error::{Result, ScrapeError};
use crate::extractor::{apply_fields, first_value};
use crate::rules::{Layout, SearchRules};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde_json::Value;
use url::Url;

/// Queue for a bulk session. Only people-search pages qualify; other
/// pages carry sidebar cards that would match the generic layout.
pub fn bulk_queue(rules: &SearchRules, snapshot: &PageSnapshot, now: DateTime<Utc>) -> Result<Vec<ContactRecord>> {
    if snapshot.page_type() != PageType::Search {
        return Err(ScrapeError::NotSearchPage);
    }
    Ok(list_search_results(rules, snapshot, now))
}

/// Read every result card on the page, in display order.
///
/// Cards without a profile link are skipped. Never fails: a page with no
/// recognizable results yields an empty queue.
pub fn list_search_results(rules: &SearchRules, snapshot: &PageSnapshot, now: DateTime<Utc>) -> Vec<ContactRecord> {
    let document = Html::parse_document(&snapshot.html);
    let base = Url::parse(&snapshot.url).ok();
    let extracted_at = iso_timestamp(now);

    let cards = match pick_layout(&rules.layouts, &document) {
        Some(cards) => cards,
        None => return Vec::new(),
    };

    cards
        .into_iter()
        .enumerate()
        .filter_map(|(index, card)| {
            let profile_url = first_value(&rules.link, card, base.as_ref())?;

            let mut entry = ContactRecord::with_profile_url(profile_url);
            apply_fields(&mut entry, &rules.fields, card, base.as_ref());
            for flag in &rules.flags {
                entry.set_flag(&flag.field, card.select(&flag.selector).next().is_some());
            }
            entry.set_value(fields::SEARCH_INDEX, Value::from(index));
            entry.set_text(fields::EXTRACTED_AT, extracted_at.clone());
            entry.set_text(fields::PAGE_TYPE, "search");
            entry.set_flag(fields::SCRAPED, false);
            Some(entry)
        })
        .collect()
}

/// Containers of the first layout whose marker is on the page and that
/// actually matches some cards
fn pick_layout<'a>(layouts: &[Layout], document: &'a Html) -> Option<Vec<ElementRef<'a>>> {
    layouts.iter().find_map(|layout| {
        if let Some(marker) = &layout.marker {
            document.select(marker).next()?;
        }
        let cards: Vec<ElementRef<'a>> = document.select(&layout.container).collect();
        if cards.is_empty() { None } else { Some(cards) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rules;
    use chrono::TimeZone;

    const SEARCH_URL: &str = "https://www.linkedin.com/search/results/people/?keywords=rust";

    fn rules() -> SearchRules {
        Rules::builtin().unwrap().search
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn card(slug: &str, name: &str) -> String {
        format!(
            r#"<li class="reusable-search__result-container">
                <span class="entity-result__title-text"><a href="/in/{slug}/"><span aria-hidden="true">{name}</span></a></span>
                <div class="entity-result__primary-subtitle">Engineer</div>
                <div class="entity-result__secondary-subtitle">Acme</div>
                <div class="entity-result__secondary-subtitle">Berlin, Germany</div>
            </li>"#
        )
    }

    #[test]
    fn test_lists_cards_in_document_order() {
        let html = format!(
            r#"<html><body><div class="search-results-container"><ul>{}{}</ul></div></body></html>"#,
            card("alice", "Alice"),
            card("bob", "Bob")
        );
        let snapshot = PageSnapshot::new(SEARCH_URL, html);

        let queue = list_search_results(&rules(), &snapshot, now());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].profile_url(), Some("https://www.linkedin.com/in/alice/"));
        assert_eq!(queue[0].text("name"), Some("Alice"));
        assert_eq!(queue[0].text("title"), Some("Engineer"));
        assert_eq!(queue[0].text("company"), Some("Acme"));
        assert_eq!(queue[0].text("location"), Some("Berlin, Germany"));
        assert_eq!(queue[0].text("pageType"), Some("search"));
        assert_eq!(queue[0].get("searchIndex"), Some(&Value::from(0)));
        assert!(!queue[0].is_scraped());
        assert_eq!(queue[1].text("name"), Some("Bob"));
    }

    #[test]
    fn test_skips_cards_without_profile_link() {
        let html = format!(
            r#"<html><body><div class="search-results-container"><ul>
                <li class="reusable-search__result-container"><span>Ad</span></li>
                {}</ul></div></body></html>"#,
            card("carol", "Carol")
        );
        let snapshot = PageSnapshot::new(SEARCH_URL, html);

        let queue = list_search_results(&rules(), &snapshot, now());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].text("name"), Some("Carol"));
        // index counts the skipped card
        assert_eq!(queue[0].get("searchIndex"), Some(&Value::from(1)));
    }

    #[test]
    fn test_location_requires_comma_and_flags() {
        let html = r#"<html><body><div class="search-results__list">
            <div class="search-results__result-item">
                <a href="https://www.linkedin.com/in/dave">Dave</a>
                <span class="actor-name">Dave</span>
                <span data-field="location">Remote</span>
                <span class="subline-level-3">3 mutual connections</span>
                <i class="premium-icon"></i>
            </div>
        </div></body></html>"#;
        let snapshot = PageSnapshot::new(SEARCH_URL, html);

        let queue = list_search_results(&rules(), &snapshot, now());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].text("name"), Some("Dave"));
        assert!(!queue[0].contains("location"));
        assert_eq!(queue[0].text("mutualConnections"), Some("3 mutual connections"));
        assert_eq!(queue[0].get("premium"), Some(&Value::Bool(true)));
        assert_eq!(queue[0].get("openLink"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_generic_layout_fallback() {
        let html = r#"<html><body>
            <div class="entity-result"><a href="/in/erin">Erin</a></div>
        </body></html>"#;
        let snapshot = PageSnapshot::new(SEARCH_URL, html);

        let queue = list_search_results(&rules(), &snapshot, now());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].profile_url(), Some("https://www.linkedin.com/in/erin"));
    }

    #[test]
    fn test_bulk_queue_only_from_search_pages() {
        let html = r#"<html><body>
            <h1 class="text-heading-xlarge">Jane</h1>
            <div class="entity-result"><a href="/in/also-viewed-1">One</a></div>
            <div class="entity-result"><a href="/in/also-viewed-2">Two</a></div>
        </body></html>"#;

        let profile = PageSnapshot::new("https://www.linkedin.com/in/jane/", html);
        assert_eq!(bulk_queue(&rules(), &profile, now()), Err(ScrapeError::NotSearchPage));

        let feed = PageSnapshot::new("https://www.linkedin.com/feed/", html);
        assert_eq!(bulk_queue(&rules(), &feed, now()), Err(ScrapeError::NotSearchPage));

        let search = PageSnapshot::new(SEARCH_URL, html);
        assert_eq!(bulk_queue(&rules(), &search, now()).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_page_yields_empty_queue() {
        let snapshot = PageSnapshot::new(SEARCH_URL, "<html><body><p>No results</p></body></html>");

        assert!(list_search_results(&rules(), &snapshot, now()).is_empty());
    }
}
