/// Reusable UI components

use crate::contact::{fields, ContactRecord};
use yew::prelude::*;

/// Fields shown on a contact card, in display order
const CARD_FIELDS: [(&str, &str); 5] = [
    (fields::TITLE, "Title"),
    (fields::COMPANY, "Company"),
    (fields::LOCATION, "Location"),
    (fields::EMAIL, "Email"),
    (fields::SCRAPED_AT, "Scraped"),
];

#[derive(Properties, PartialEq)]
pub struct ContactCardProps {
    pub contact: ContactRecord,
}

#[function_component(ContactCard)]
pub fn contact_card(props: &ContactCardProps) -> Html {
    let contact = &props.contact;
    let name = contact.text(fields::NAME).unwrap_or("(no name)");

    html! {
        <div class="contact-card">
            <div class="contact-name">
                if let Some(url) = contact.profile_url() {
                    <a href={url.to_string()} target="_blank">{name}</a>
                } else {
                    {name}
                }
            </div>
            {for CARD_FIELDS.iter().filter_map(|(field, label)| {
                contact.text(field).map(|value| html! {
                    <div class="contact-field">
                        <span class="contact-label">{*label}</span>
                        <span class="contact-value">{value}</span>
                    </div>
                })
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ContactRowProps {
    pub contact: ContactRecord,
}

/// One line in the history list
#[function_component(ContactRow)]
pub fn contact_row(props: &ContactRowProps) -> Html {
    let contact = &props.contact;
    let name = contact.text(fields::NAME).unwrap_or("(no name)");
    let detail = contact
        .text(fields::TITLE)
        .or(contact.text(fields::COMPANY))
        .unwrap_or_default();

    html! {
        <div class="stat-item">
            <span class="stat-domain" title={detail.to_string()}>{name}</span>
            <span class="stat-count">{short_date(contact.text(fields::SCRAPED_AT))}</span>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct StatCounterProps {
    pub label: AttrValue,
    pub value: usize,
}

#[function_component(StatCounter)]
pub fn stat_counter(props: &StatCounterProps) -> Html {
    html! {
        <div class="stat-counter">
            <span class="stat-counter-value">{props.value}</span>
            <span class="stat-counter-label">{props.label.clone()}</span>
        </div>
    }
}

/// `2024-05-01T12:00:00.000Z` -> `2024-05-01`
fn short_date(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(|t| t.get(..10))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_date() {
        assert_eq!(short_date(Some("2024-05-01T12:00:00.000Z")), "2024-05-01");
        assert_eq!(short_date(Some("2024")), "");
        assert_eq!(short_date(None), "");
    }
}
