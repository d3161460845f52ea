/// Short form and long form of each SCPI keyword we accept abbreviated.
///
/// `STATUS` maps to itself so the long form survives; its own short form `STAT` is taken by
/// `STATE`.
const KEYWORDS: &[(&str, &str)] = &[
    ("STATUS", "STATUS"),
    ("SOUR", "SOURCE"),
    ("VOLT", "VOLTAGE"),
    ("CURR", "CURRENT"),
    ("MEAS", "MEASURE"),
    ("OUTP", "OUTPUT"),
    ("STAT", "STATE"),
    ("PROT", "PROTECTION"),
    ("SYST", "SYSTEM"),
    ("QUES", "QUESTIONABLE"),
    ("OPER", "OPERATION"),
    ("COND", "CONDITION"),
    ("IMME", "IMMEDIATE"),
    ("AMPL", "AMPLITUDE"),
    ("LEVE", "LEVEL"),
    ("TRIP", "TRIPPED"),
    ("POW", "POWER"),
    ("VERS", "VERSION"),
    ("ERR", "ERROR"),
];

/// Upper-case `command` and expand abbreviated keywords to their long form.
///
/// The scan runs left to right over the text, not over `:`-separated tokens, so an
/// abbreviation inside a longer word is expanded too. Long forms are copied unchanged,
/// which makes `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(command: &str) -> String {
    let upper = command.to_uppercase();
    let mut normalized = String::with_capacity(upper.len() * 2);
    let mut rest = upper.as_str();

    'scan: while !rest.is_empty() {
        for &(_, long) in KEYWORDS {
            if let Some(tail) = rest.strip_prefix(long) {
                normalized.push_str(long);
                rest = tail;
                continue 'scan;
            }
        }
        for &(short, long) in KEYWORDS {
            if let Some(tail) = rest.strip_prefix(short) {
                normalized.push_str(long);
                rest = tail;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            normalized.push(c);
        }
        rest = chars.as_str();
    }
    normalized
}
