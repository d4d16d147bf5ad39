use super::narrator::VoiceInfo;

/// Names that mark a network-backed, higher-quality voice family.
const PREMIUM_MARKERS: [&str; 2] = ["Google", "Microsoft"];

/// Ranked-preference voice selection: an ordered list of predicates over
/// the available voices, first rank with a match wins. Preference order:
/// premium network voice in the target language, any non-local voice in
/// the target language, exact region match, then anything.
pub fn choose_voice<'a>(
    voices: &'a [VoiceInfo],
    language: &str,
    region: &str,
) -> Option<&'a VoiceInfo> {
    let ranks: [&dyn Fn(&VoiceInfo) -> bool; 4] = [
        &|v| {
            v.lang.starts_with(language)
                && !v.local
                && PREMIUM_MARKERS.iter().any(|m| v.name.contains(m))
        },
        &|v| v.lang.starts_with(language) && !v.local,
        &|v| v.lang == region,
        &|_| true,
    ];

    for rank in ranks {
        if let Some(voice) = voices.iter().find(|&v| rank(v)) {
            return Some(voice);
        }
    }
    None
}
