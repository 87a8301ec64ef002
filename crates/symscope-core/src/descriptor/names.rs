//! Type name helpers: template argument splitting and name matching.

use smallvec::SmallVec;

/// Split the top-level template arguments out of a type name
///
/// Only the argument list opened by the first `<` is split. Nested argument
/// lists stay inside their token, and every token is trimmed.
pub(crate) fn template_arguments(name: &str) -> Vec<String>
{
    let Some(open) = name.find('<') else {
        return Vec::new();
    };
    if open == 0 {
        return Vec::new();
    }

    let mut arguments: SmallVec<[String; 4]> = SmallVec::new();
    let mut depth = 0_usize;
    let mut start = open + 1;

    for (offset, ch) in name[open + 1..].char_indices() {
        let position = open + 1 + offset;
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' if depth > 0 => depth -= 1,
            '>' => {
                push_argument(&mut arguments, &name[start..position]);
                return arguments.into_vec();
            }
            ',' if depth == 0 => {
                push_argument(&mut arguments, &name[start..position]);
                start = position + 1;
            }
            _ => {}
        }
    }

    // Unterminated list, keep whatever was collected.
    push_argument(&mut arguments, &name[start..]);
    arguments.into_vec()
}

fn push_argument(arguments: &mut SmallVec<[String; 4]>, raw: &str)
{
    let token = raw.trim();
    if !token.is_empty() {
        arguments.push(token.to_string());
    }
}

/// Parse a template argument as an integer literal
///
/// Accepts decimal and `0x` hexadecimal, with an optional minus and the usual
/// integer suffixes (`u`, `l`, `ll`, `ul`, ...).
pub(crate) fn parse_integer(token: &str) -> Option<i64>
{
    let token = token.trim().trim_end_matches(['u', 'U', 'l', 'L']);
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    // `from_str_radix` would also take a sign here.
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;

    if negative {
        0_i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Check whether a type name matches a requested name
///
/// Names compare case-insensitively. A pattern containing `<>` is an open
/// generic name: it matches when every piece around the `<>` markers occurs in
/// the type name, so `List<>` matches `List<int>`.
pub(crate) fn type_name_matches(type_name: &str, pattern: &str) -> bool
{
    if type_name.eq_ignore_ascii_case(pattern) {
        return true;
    }
    if !pattern.contains("<>") {
        return false;
    }

    let type_name = type_name.to_ascii_lowercase();
    pattern
        .to_ascii_lowercase()
        .split("<>")
        .filter(|part| !part.is_empty())
        .all(|part| type_name.contains(part))
}

/// Split `module!name` into its parts
pub(crate) fn split_module(qualified: &str) -> (Option<&str>, &str)
{
    match qualified.find('!') {
        Some(bang) if bang > 0 => (Some(&qualified[..bang]), &qualified[bang + 1..]),
        _ => (None, qualified),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_template_arguments_simple()
    {
        assert_eq!(template_arguments("std::pair<int, float>"), vec!["int", "float"]);
        assert!(template_arguments("Plain").is_empty());
    }

    #[test]
    fn test_template_arguments_nested()
    {
        assert_eq!(
            template_arguments("std::map<int,std::pair<char,long>,std::less<int> >"),
            vec!["int", "std::pair<char,long>", "std::less<int>"]
        );
    }

    #[test]
    fn test_template_arguments_stop_at_first_list()
    {
        assert_eq!(template_arguments("Outer<int>::Inner<char>"), vec!["int"]);
        assert_eq!(template_arguments("Fn<void (int, int)>"), vec!["void (int, int)"]);
    }

    #[test]
    fn test_template_arguments_integer_literals()
    {
        let arguments = template_arguments("std::array<int,16>");
        assert_eq!(arguments, vec!["int", "16"]);
        assert_eq!(parse_integer(&arguments[1]), Some(16));
        assert_eq!(parse_integer(&arguments[0]), None);
    }

    #[test]
    fn test_parse_integer_forms()
    {
        assert_eq!(parse_integer("-3"), Some(-3));
        assert_eq!(parse_integer("0x10"), Some(16));
        assert_eq!(parse_integer("8ul"), Some(8));
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("true"), None);
    }

    #[test]
    fn test_parse_integer_bounds_and_signs()
    {
        assert_eq!(parse_integer("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_integer("-0x8000000000000000"), Some(i64::MIN));
        assert_eq!(parse_integer("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_integer("9223372036854775808"), None);
        assert_eq!(parse_integer("-9223372036854775809"), None);
        assert_eq!(parse_integer("0x-5"), None);
        assert_eq!(parse_integer("0x+5"), None);
        assert_eq!(parse_integer("+5"), None);
        assert_eq!(parse_integer("--5"), None);
        assert_eq!(parse_integer("0x"), None);
    }

    #[test]
    fn test_type_name_matches()
    {
        assert!(type_name_matches("Base", "base"));
        assert!(!type_name_matches("Base", "Derived"));
        assert!(type_name_matches("System.Collections.Generic.List<System.Int32>", "system.collections.generic.list<>"));
        assert!(type_name_matches("std::pair<int,float>", "std::pair<>"));
        assert!(!type_name_matches("std::vector<int>", "std::pair<>"));
    }

    #[test]
    fn test_split_module()
    {
        assert_eq!(split_module("app!Derived"), (Some("app"), "Derived"));
        assert_eq!(split_module("Derived"), (None, "Derived"));
        assert_eq!(split_module("!Derived"), (None, "!Derived"));
    }
}
