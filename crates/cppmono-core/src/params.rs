//! Counting template parameters and matching instantiation sites.

use crate::stream::TokenStream;
use crate::token::TokenId;

/// Count the top-level comma-separated parameters of the argument list
/// opened by `lt`. Returns 0 when the construct is not a well-formed
/// template argument list.
///
/// Tolerates nested `<...>` (with `>>` closing two levels), qualified names,
/// leading `const`/`struct`/`union`/`&`, pointer and reference suffixes, and
/// function-pointer suffixes formed by linked `(...)` / `[...]` groups.
pub fn template_parameters(stream: &TokenStream, lt: Option<TokenId>) -> usize {
    let Some(lt) = lt else { return 0 };
    if stream.text(lt) != "<" {
        return 0;
    }
    let mut count = 1usize;
    let mut level = 0usize;
    let mut cur = stream.next(lt);

    while let Some(mut tok) = cur {
        // leading const
        if stream.text(tok) == "const" {
            match stream.next(tok) {
                Some(n) => tok = n,
                None => return 0,
            }
        }
        // struct/union keyword
        if matches!(stream.text(tok), "struct" | "union") {
            match stream.next(tok) {
                Some(n) => tok = n,
                None => return 0,
            }
        }
        // leading '&' before an (optionally qualified) name
        if stream.text(tok) == "&" {
            let after = stream.next(tok);
            let named = match after {
                Some(a) if stream.text(a) == "::" => {
                    stream.next(a).is_some_and(|n| stream.token(n).is_name())
                }
                Some(a) => stream.token(a).is_name(),
                None => false,
            };
            if named {
                tok = after.unwrap();
            }
        }
        // leading :: and Id :: qualifiers
        if stream.text(tok) == "::" {
            match stream.next(tok) {
                Some(n) => tok = n,
                None => return 0,
            }
        }
        while stream.token(tok).is_name() && stream.text_is(tok, 1, "::") {
            match stream.at(tok, 2) {
                Some(n) => tok = n,
                None => return 0,
            }
        }

        // the parameter atom: number, char literal or name
        let atom = stream.token(tok);
        if !atom.is_number() && !atom.is_char_lit() && !atom.is_name() {
            return 0;
        }
        let Some(mut tok) = stream.next(tok) else { return 0 };

        // trailing * & const
        while matches!(stream.text(tok), "*" | "&" | "const") {
            match stream.next(tok) {
                Some(n) => tok = n,
                None => return 0,
            }
        }

        // function pointer or prototype suffix
        while matches!(stream.text(tok), "(" | "[") {
            let Some(close) = stream.link(tok) else { return 0 };
            match stream.next(close) {
                Some(n) => tok = n,
                None => return 0,
            }
        }

        // inner template
        if stream.text(tok) == "<" {
            level += 1;
            match stream.next(tok) {
                Some(n) => tok = n,
                None => return 0,
            }
        }

        // closers
        while matches!(stream.text(tok), ">" | ">>") {
            if level == 0 {
                return count;
            }
            level -= 1;
            if stream.text(tok) == ">>" {
                if level == 0 {
                    return count;
                }
                level -= 1;
            }
            match stream.next(tok) {
                Some(n) => tok = n,
                None => return 0,
            }
            while matches!(stream.text(tok), "*" | "&") {
                match stream.next(tok) {
                    Some(n) => tok = n,
                    None => return 0,
                }
            }
        }

        if stream.text(tok) != "," {
            // multi-word type; re-enter with the next word as the atom
            cur = Some(tok);
            continue;
        }
        if level == 0 {
            count += 1;
        }
        cur = stream.next(tok);
    }
    0
}

/// What must follow the closing `>` of a matching instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterPattern {
    /// `(` for a function instantiation.
    OpenParen,
    /// Optional `*` then a name, for a variable of the instantiated type.
    OptStarName,
    /// `:: ~opt name (` for an out-of-class member definition.
    MemberFunc,
}

/// True when `instance` starts `name < ... >` with exactly `num_args`
/// top-level arguments, optionally checking the token after the closer.
pub fn instantiate_match(
    stream: &TokenStream,
    instance: TokenId,
    name: &str,
    num_args: usize,
    after: Option<AfterPattern>,
) -> bool {
    if stream.text(instance) != name || !stream.text_is(instance, 1, "<") {
        return false;
    }
    if num_args != template_parameters(stream, stream.next(instance)) {
        return false;
    }
    let Some(after) = after else { return true };

    // walk to the closing > of the argument list
    let mut indent = 0usize;
    let mut cur = Some(instance);
    let closer = loop {
        let Some(tok) = cur else { return false };
        let text = stream.text(tok);
        if (text == ">" && indent == 0) || (text == ">>" && indent <= 1) {
            break tok;
        }
        if matches!(text, "<" | ",")
            && stream.at(tok, 1).is_some_and(|n| stream.token(n).is_name())
            && stream.text_is(tok, 2, "<")
            && template_parameters(stream, stream.at(tok, 2)) > 0
        {
            indent += 1;
        } else if indent > 0 && text == ">" {
            indent -= 1;
        } else if indent > 0 && text == ">>" {
            indent -= if indent > 1 { 2 } else { 1 };
        }
        cur = stream.next(tok);
    };

    let Some(next) = stream.next(closer) else { return false };
    match after {
        AfterPattern::OpenParen => stream.text(next) == "(",
        AfterPattern::OptStarName => {
            if stream.text(next) == "*" {
                stream.next(next).is_some_and(|n| stream.token(n).is_name())
            } else {
                stream.token(next).is_name()
            }
        }
        AfterPattern::MemberFunc => {
            if stream.text(next) != "::" {
                return false;
            }
            let mut tok = match stream.next(next) {
                Some(t) => t,
                None => return false,
            };
            if stream.text(tok) == "~" {
                tok = match stream.next(tok) {
                    Some(t) => t,
                    None => return false,
                };
            }
            stream.token(tok).is_name() && stream.text_is(tok, 1, "(")
        }
    }
}
