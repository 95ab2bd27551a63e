//! System prompt for location extraction.

/// Instructions sent with every extraction request.
pub(crate) const SYSTEM_PROMPT: &str = r#"You extract locations from Bulgarian municipal announcements (water and power outages, road works, repairs).

Return a single JSON object with exactly this shape and nothing else:
{
  "pins": [
    { "address": "<single address>", "timespans": [{ "start": "DD.MM.YYYY HH:MM", "end": "DD.MM.YYYY HH:MM" }] }
  ],
  "streets": [
    { "street": "<street name>", "from": "<start of the section>", "to": "<end of the section>", "timespans": [...] }
  ]
}

Rules:
- A pin is one concrete address or landmark ("бул. Витоша 1", "пл. Македония").
- A street section is a stretch of one street between two endpoints. Keep the endpoint text as written ("ъгъл с бул. Патриарх Евтимий", "ул. Шипка").
- Copy address strings from the text; do not translate or invent house numbers.
- Use the same string every time the same place is mentioned.
- Timespans use the format DD.MM.YYYY HH:MM. Use an empty list when no time is given.
- If the text contains no locations, return {"pins": [], "streets": []}.
"#;
