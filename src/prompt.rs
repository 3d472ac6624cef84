//! Prompts that ask the model to extract events from page text.
//!
//! Both prompts spell out the output shape, the field vocabulary and the
//! closed category list, and both tell the model to return an empty result
//! instead of inventing events.

use crate::models::Category;

/// Upper bound on events requested per listing page.
pub const MAX_EVENTS_PER_PAGE: usize = 5;

/// What a listing prompt is being built for.
#[derive(Debug, Clone, Copy)]
pub struct ListingRequest<'a> {
    pub text: &'a str,
    pub source_url: &'a str,
    pub city: &'a str,
    /// Set only for national pages that must be narrowed to `city`.
    pub filter_to_city: bool,
}

fn category_vocabulary() -> String {
    Category::ALL
        .iter()
        .map(|c| format!("\"{}\"", c.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn field_vocabulary() -> String {
    format!(
        "- title: string (event name, required)\n\
         - date: string (start date as YYYY-MM-DD, or null if unknown)\n\
         - end_date: string (last day as YYYY-MM-DD, or null for single-day events)\n\
         - city: string (Colombian city where the event happens)\n\
         - venue: string (venue name, or null)\n\
         - address: string (street address, or null)\n\
         - description: string (in Spanish, at most 3 sentences)\n\
         - category: one of {categories}\n\
         - image_url: string (absolute image URL, or null)\n\
         - url: string (link to the event's own page, or null)\n\
         - contact_info: string (phone or email, or null)\n",
        categories = category_vocabulary()
    )
}

/// Prompt for a page listing several events.
pub fn build_listing_prompt(request: &ListingRequest<'_>) -> String {
    let scope = if request.filter_to_city {
        format!(
            "This page is a national agenda covering many Colombian cities. \
             Only return events that take place in {city}. Discard every event \
             located in any other city.\n",
            city = request.city
        )
    } else {
        format!(
            "This page lists events for {city}, Colombia.\n",
            city = request.city
        )
    };

    format!(
        "You are an event extraction agent. Read the text of a web page listing events in Colombia.\n\
         {scope}\
         Extract between 1 and {max} distinct, real events mentioned in the text.\n\n\
         Return a STRICT JSON array. Each element is an object with these keys:\n\
         {fields}\n\
         Output only the JSON array, with no commentary.\n\
         If the text contains no clear events, return an empty array []. Never invent events.\n\n\
         Source URL: {url}\n\n\
         Source Text:\n{text}\n",
        scope = scope,
        max = MAX_EVENTS_PER_PAGE,
        fields = field_vocabulary(),
        url = request.source_url,
        text = request.text,
    )
}

/// Prompt for a page that should describe exactly one event.
pub fn build_detail_prompt(text: &str, page_url: &str) -> String {
    format!(
        "You are an event extraction agent. Read the text of a single web page from a Colombian events site.\n\
         If the page describes one specific event, return exactly ONE JSON object with these keys:\n\
         {fields}\n\
         If the page is not about a specific event (a listing, a news article, an error page), \
         return the literal null. Never invent an event.\n\
         Output only the JSON object or null, with no commentary.\n\n\
         Page URL: {url}\n\n\
         Page Text:\n{text}\n",
        fields = field_vocabulary(),
        url = page_url,
        text = text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filter_to_city: bool) -> ListingRequest<'static> {
        ListingRequest {
            text: "Concierto de salsa en el Teatro Colón",
            source_url: "https://example.com/agenda",
            city: "Riohacha",
            filter_to_city,
        }
    }

    #[test]
    fn test_listing_prompt_declares_shape_and_vocabulary() {
        let prompt = build_listing_prompt(&request(false));
        assert!(prompt.contains("STRICT JSON array"));
        assert!(prompt.contains("between 1 and 5"));
        for category in Category::ALL {
            assert!(prompt.contains(&format!("\"{}\"", category.as_str())));
        }
        for key in ["title:", "date:", "city:", "venue:", "description:", "image_url:", "url:"] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("empty array []"));
        assert!(prompt.contains("https://example.com/agenda"));
        assert!(prompt.contains("Concierto de salsa"));
    }

    #[test]
    fn test_listing_prompt_city_filter() {
        let unfiltered = build_listing_prompt(&request(false));
        assert!(!unfiltered.contains("Discard every event"));

        let filtered = build_listing_prompt(&request(true));
        assert!(filtered.contains("Only return events that take place in Riohacha"));
        assert!(filtered.contains("Discard every event"));
    }

    #[test]
    fn test_detail_prompt_allows_null() {
        let prompt = build_detail_prompt("Obra de teatro", "https://example.com/agenda/obra");
        assert!(prompt.contains("exactly ONE JSON object"));
        assert!(prompt.contains("literal null"));
        assert!(prompt.contains("\"culture\""));
        assert!(prompt.contains("https://example.com/agenda/obra"));
    }
}
