//! VMS filename handling: path translation to the local filesystem,
//! case-insensitive wildcard matching, and the legacy list of file types
//! skipped during extraction.

/// File types that extraction skips unless `-e` is given.  These are the
/// binary artifacts of VMS/RSX builds that are useless outside the
/// original system.
const IGNORED_TYPES: [&str; 14] = [
    "exe", // vms executable image
    "lib", // vms object library
    "obj", // rsx object file
    "odl", // rsx overlay description file
    "olb", // rsx object library
    "pmd", // rsx post mortem dump
    "stb", // rsx symbol table
    "sys", // rsx bootable system image
    "tsk", // rsx executable image
    "dir", // directory
    "upd",
    "tlo",
    "tlb", // text library
    "hlb", // help library
];

/// True when the file's type segment marks it as an ignored legacy
/// artifact.  Only the first three bytes are significant; the comparison
/// is byte-wise because names come off the tape and need not be ASCII.
pub fn is_ignored_type(ext: &str) -> bool {
    let ext = ext.as_bytes();
    IGNORED_TYPES
        .iter()
        .any(|t| ext.len() >= 3 && ext[..3].eq_ignore_ascii_case(t.as_bytes()))
}

/// Translate a VMS path like `[DIR.SUB]NAME.EXT;3` into a relative
/// filesystem path.
///
/// The name is lower-cased; directory separators (`.` within the bracketed
/// part, and the closing `]`) become `/`.  With `keep_full_path` false only
/// the segment after the last `]` is used.  The `;version` suffix is
/// stripped, or kept as `name.ext:version` when `keep_version` is set.
pub fn translate(vms_name: &str, keep_full_path: bool, keep_version: bool) -> String {
    let lower = vms_name.to_ascii_lowercase();
    let (dir, base) = split_path(&lower);
    let base = match (keep_version, base.find(';')) {
        (true, Some(i)) => format!("{}:{}", &base[..i], &base[i + 1..]),
        (false, Some(i)) => base[..i].to_string(),
        (_, None) => base.to_string(),
    };
    if keep_full_path && !dir.is_empty() {
        format!("{}/{}", dir.trim_start_matches('[').replace('.', "/"), base)
    } else {
        base
    }
}

/// Build the name a filter pattern is matched against: the VMS form, with
/// or without the directory part and version suffix.
pub fn match_candidate(vms_name: &str, keep_full_path: bool, keep_version: bool) -> String {
    let (_, base) = split_path(vms_name);
    let name = if keep_full_path { vms_name } else { base };
    match (keep_version, name.find(';')) {
        (true, Some(i)) => format!("{}:{}", &name[..i], &name[i + 1..]),
        (false, Some(i)) => name[..i].to_string(),
        (_, None) => name.to_string(),
    }
}

/// The type segment of a VMS name: text after the last `.` of the base
/// name, without the version suffix.
pub fn type_segment(vms_name: &str) -> &str {
    let (_, base) = split_path(vms_name);
    let base = base.split(';').next().unwrap_or(base);
    match base.rfind('.') {
        Some(i) => &base[i + 1..],
        None => "",
    }
}

fn split_path(name: &str) -> (&str, &str) {
    match name.rfind(']') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

/// Case-insensitive wildcard match: `*` matches any run of characters,
/// `?` matches exactly one.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pat: Vec<u8> = pattern.bytes().map(|b| b.to_ascii_lowercase()).collect();
    let txt: Vec<u8> = name.bytes().map(|b| b.to_ascii_lowercase()).collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < txt.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last star swallow one more character.
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }
    p == pat.len()
}
