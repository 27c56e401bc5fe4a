use regex::Regex;
use std::sync::LazyLock;

/// Frases que no aportan nada a la búsqueda. Las más largas van primero
/// para que "official music video" no quede a medias.
const NOISE_PHRASES: &[&str] = &[
    "official music video",
    "official lyric video",
    "official video",
    "official audio",
    "lyric video",
    "music video",
    "lyrics",
    "lyric",
    "audio only",
    "hd",
    "hq",
    "4k",
];

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = NOISE_PHRASES
        .iter()
        .map(|phrase| regex::escape(phrase).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternatives})\b")).expect("patrón de ruido válido")
});

/// Limpia una búsqueda de texto libre antes de pasarla al resolver.
///
/// Pasa a minúsculas, quita frases de ruido ("official video", "lyrics",
/// "hd", ...), trata los corchetes y paréntesis como espacios y colapsa los
/// espacios. Se repite hasta que el texto deja de cambiar, así que
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(query: &str) -> String {
    let mut current = collapse(&strip_brackets(&query.to_lowercase()));

    loop {
        let cleaned = collapse(&NOISE.replace_all(&current, " "));
        if cleaned == current {
            return cleaned;
        }
        current = cleaned;
    }
}

fn strip_brackets(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '{' | '}' | '|' => ' ',
            other => other,
        })
        .collect()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
