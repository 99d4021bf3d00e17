//! Type annotation normalization
//!
//! Decides whether two textual annotations describe the same type. The text is
//! parsed into a tiny expression tree (`Name`, `Generic`, bracket `List`,
//! `Union`) and rendered back in canonical form:
//!
//! 1. `<class 'a.b.C'>` reprs become `C`
//! 2. `Union[A, B]` and `Optional[A]` become pipe unions
//! 3. dotted qualifiers are dropped (`pathlib.Path` -> `Path`)
//! 4. union members are sorted and joined with `" | "`
//!
//! Input that does not parse (unbalanced brackets, dangling `|`, a stray
//! class repr fragment) is returned trimmed but otherwise untouched.

use std::borrow::Cow;

const CLASS_REPR_OPEN: &str = "<class '";
const CLASS_REPR_CLOSE: &str = "'>";

/// Normalize an annotation for equality comparison.
///
/// `None` stays `None`.
pub fn normalize_type(type_str: Option<&str>) -> Option<String> {
    type_str.map(normalize_str)
}

/// Compare two annotations modulo syntactic variation
pub fn types_equal(a: Option<&str>, b: Option<&str>) -> bool {
    normalize_type(a) == normalize_type(b)
}

/// Normalize a present annotation
pub fn normalize_str(type_str: &str) -> String {
    let trimmed = type_str.trim();
    let stripped = strip_class_reprs(trimmed);
    // Leftover repr fragments could be reordered into a new repr
    if stripped.contains(CLASS_REPR_OPEN) || stripped.contains(CLASS_REPR_CLOSE) {
        return trimmed.to_string();
    }

    match Parser::new(&stripped).parse() {
        Some(expr) => render(&expr),
        None => {
            tracing::warn!(annotation = trimmed, "unparseable annotation kept verbatim");
            trimmed.to_string()
        }
    }
}

/// Parsed annotation, borrowing names from the source text
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeExpr<'a> {
    Name(&'a str),
    Generic(&'a str, Vec<TypeExpr<'a>>),
    /// Bare bracket list, e.g. the parameter list of `Callable[[int], str]`
    List(Vec<TypeExpr<'a>>),
    Union(Vec<TypeExpr<'a>>),
}

/// Recursive descent parser over the delimiter bytes `[ ] , |`
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn parse(mut self) -> Option<TypeExpr<'a>> {
        let expr = self.parse_union()?;
        self.skip_ws();
        if self.pos != self.src.len() {
            return None;
        }
        Some(expr)
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_union(&mut self) -> Option<TypeExpr<'a>> {
        let mut members = vec![self.parse_atom()?];
        loop {
            self.skip_ws();
            if self.peek() != Some(b'|') {
                break;
            }
            self.pos += 1;
            members.push(self.parse_atom()?);
        }

        if members.len() == 1 {
            members.pop()
        } else {
            Some(TypeExpr::Union(members))
        }
    }

    fn parse_atom(&mut self) -> Option<TypeExpr<'a>> {
        self.skip_ws();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'[' | b']' | b',' | b'|') {
                break;
            }
            self.pos += 1;
        }
        let name = self.src[start..self.pos].trim();

        if self.peek() == Some(b'[') {
            self.pos += 1;
            let args = self.parse_args()?;
            if self.peek() != Some(b']') {
                return None;
            }
            self.pos += 1;
            return Some(if name.is_empty() {
                TypeExpr::List(args)
            } else {
                TypeExpr::Generic(name, args)
            });
        }

        if name.is_empty() {
            None
        } else {
            Some(TypeExpr::Name(name))
        }
    }

    /// Parse comma separated args; leaves the closing `]` unconsumed
    fn parse_args(&mut self) -> Option<Vec<TypeExpr<'a>>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            return Some(args);
        }
        loop {
            args.push(self.parse_union()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => return Some(args),
                _ => return None,
            }
        }
    }
}

fn render(expr: &TypeExpr<'_>) -> String {
    match expr {
        TypeExpr::Name(name) => strip_qualifier(name).to_string(),
        TypeExpr::Generic(name, args) => match strip_qualifier(name) {
            "Union" | "Optional" => render_union(expr),
            base => format!("{}[{}]", base, render_list(args)),
        },
        TypeExpr::List(args) => format!("[{}]", render_list(args)),
        TypeExpr::Union(_) => render_union(expr),
    }
}

fn render_list(args: &[TypeExpr<'_>]) -> String {
    args.iter().map(render).collect::<Vec<_>>().join(", ")
}

fn render_union(expr: &TypeExpr<'_>) -> String {
    let mut members = Vec::new();
    collect_union_members(expr, &mut members);
    members.sort();
    members.dedup();
    members.join(" | ")
}

/// Flatten nested unions (pipe, `Union[...]`, `Optional[...]`) into rendered members
fn collect_union_members(expr: &TypeExpr<'_>, out: &mut Vec<String>) {
    match expr {
        TypeExpr::Union(members) => {
            for member in members {
                collect_union_members(member, out);
            }
        }
        TypeExpr::Generic(name, args) => match strip_qualifier(name) {
            "Union" => {
                for arg in args {
                    collect_union_members(arg, out);
                }
            }
            "Optional" => {
                for arg in args {
                    collect_union_members(arg, out);
                }
                out.push("None".to_string());
            }
            _ => out.push(render(expr)),
        },
        _ => out.push(render(expr)),
    }
}

/// `a.b.C` -> `C`; anything that is not a dotted identifier path is kept
fn strip_qualifier(name: &str) -> &str {
    if !name.contains('.') || !name.split('.').all(is_identifier) {
        return name;
    }
    name.rsplit('.').next().unwrap_or(name)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Replace every `<class 'mod.Name'>` with `Name`
fn strip_class_reprs(s: &str) -> Cow<'_, str> {
    if !s.contains(CLASS_REPR_OPEN) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find(CLASS_REPR_OPEN) {
        let inner_start = open + CLASS_REPR_OPEN.len();
        let Some(close) = rest[inner_start..].find(CLASS_REPR_CLOSE) else {
            break;
        };
        let inner = &rest[inner_start..inner_start + close];
        out.push_str(&rest[..open]);
        out.push_str(inner.rsplit('.').next().unwrap_or(inner));
        rest = &rest[inner_start + close + CLASS_REPR_CLOSE.len()..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        normalize_str(s)
    }

    #[test]
    fn test_none_input() {
        assert_eq!(normalize_type(None), None);
    }

    #[test]
    fn test_union_ordering() {
        assert_eq!(norm("str | None"), "None | str");
        assert_eq!(norm("None | str"), "None | str");
        assert_eq!(norm("int | str | None"), "None | int | str");
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(norm("pathlib.Path"), "Path");
        assert_eq!(norm("list[pathlib.Path]"), "list[Path]");
        assert_eq!(norm("dict[str, pathlib.Path]"), "dict[str, Path]");
        assert_eq!(norm("typing.Dict[str,  os.PathLike]"), "Dict[str, PathLike]");
    }

    #[test]
    fn test_typing_union_rewrite() {
        assert_eq!(norm("Union[int, str]"), "int | str");
        assert_eq!(norm("typing.Union[str, None]"), "None | str");
        assert_eq!(norm("Optional[pathlib.Path]"), "None | Path");
        assert_eq!(norm("Union[Union[b, a], c]"), "a | b | c");
    }

    #[test]
    fn test_union_inside_callable_params() {
        assert_eq!(
            norm("Callable[[Union[str, int], typing.Any], None]"),
            "Callable[[int | str, Any], None]"
        );
        assert_eq!(norm("Callable[[], int]"), "Callable[[], int]");
        assert_eq!(norm("Callable[..., int]"), "Callable[..., int]");
    }

    #[test]
    fn test_nested_union_members_sorted() {
        assert_eq!(norm("list[str | None]"), "list[None | str]");
        assert_eq!(
            norm("dict[str, int | None] | None"),
            "None | dict[str, None | int]"
        );
    }

    #[test]
    fn test_class_repr_stripped() {
        assert_eq!(norm("<class 'pathlib.Path'>"), "Path");
        assert_eq!(norm("list[<class 'int'>]"), "list[int]");
        assert!(types_equal(Some("<class 'pathlib.Path'>"), Some("Path")));
    }

    #[test]
    fn test_malformed_kept_verbatim() {
        assert_eq!(norm("list[int"), "list[int");
        assert_eq!(norm("  dict[str, ]]  "), "dict[str, ]]");
        assert_eq!(norm("int |"), "int |");
        assert_eq!(norm("x'> | <class 'b"), "x'> | <class 'b");
    }

    #[test]
    fn test_non_identifier_dots_kept() {
        assert_eq!(norm("Literal[1.5]"), "Literal[1.5]");
        assert_eq!(norm("'pathlib.Path'"), "'pathlib.Path'");
    }

    #[test]
    fn test_types_equal() {
        assert!(types_equal(Some("str | None"), Some("None | str")));
        assert!(types_equal(Some("pathlib.Path"), Some("Path")));
        assert!(types_equal(Some("list[pathlib.Path]"), Some("list[Path]")));
        assert!(!types_equal(Some("str"), Some("int")));
        assert!(types_equal(None, None));
        assert!(!types_equal(Some("str"), None));
    }

    #[test]
    fn test_idempotent_on_samples() {
        for sample in [
            "str | None",
            "Union[int, str]",
            "Callable[[Optional[a.B]], c.D]",
            "dict[str, list[pathlib.Path | None]]",
            "list[int",
            "<class 'x.Y'> | int",
            "x'> | <class 'b",
        ] {
            let once = norm(sample);
            assert_eq!(norm(&once), once, "not idempotent for {sample}");
        }
    }
}
