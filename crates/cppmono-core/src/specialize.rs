//! Explicit specializations and post-run cleanup.
//!
//! [`expand_specialized`] renames `template < > void f < int > ( ... )` to a
//! plain function under the mangled name `f<int>` and rewrites every call
//! site spelled the same way, so later passes treat the specialization as an
//! ordinary function. [`cleanup_after_simplify`] removes leftover
//! `template < >` heads and collapses spelled-out instantiation names in
//! front of a call.

use std::collections::HashSet;

use crate::params::template_parameters;
use crate::stream::TokenStream;

/// Rename explicit specializations and their uses. Returns the mangled names
/// that now exist in the stream; the instantiation engine must not expand
/// them again.
pub fn expand_specialized(stream: &mut TokenStream) -> HashSet<String> {
    let mut expanded = HashSet::new();

    let mut cur = stream.front();
    while let Some(tok) = cur {
        if !stream.seq_matches(tok, &["template", "<", ">"]) {
            cur = stream.next(tok);
            continue;
        }

        // what kind of template is this?
        let mut tok2 = stream.at(tok, 3);
        while let Some(t) = tok2 {
            if stream.token(t).is_name() || stream.text(t) == "*" {
                tok2 = stream.next(t);
            } else {
                break;
            }
        }
        if template_parameters(stream, tok2) == 0 {
            cur = stream.next(tok);
            continue;
        }
        let lt = tok2.unwrap();
        // the name right before the argument list
        let name_tok = match stream.prev(lt) {
            Some(p) if stream.token(p).is_name() => p,
            _ => {
                cur = stream.next(tok);
                continue;
            }
        };

        // spell out "name < args" up to the closing >, require "> (" after
        let mut spelled: Vec<String> = Vec::new();
        let mut tok3 = Some(name_tok);
        while let Some(t) = tok3 {
            if stream.text(t) == ">" {
                break;
            }
            spelled.push(stream.text(t).to_string());
            tok3 = stream.next(t);
        }
        let closes = tok3.is_some_and(|t| stream.text_is(t, 1, "("));
        if !closes {
            cur = stream.next(tok);
            continue;
        }

        // the search pattern keeps the spacing, the new name drops it
        let mut pattern: Vec<String> = spelled.clone();
        pattern.push(">".to_string());
        pattern.push("(".to_string());
        let name = format!("{}>", spelled.concat());
        expanded.insert(name.clone());

        // rewrite the declaration itself
        let lparen = stream.find_seq(name_tok, &["("]).unwrap();
        stream.erase_range(name_tok, Some(lparen));
        stream.set_text(name_tok, name.clone());

        // delete the "template < >" head
        let after_head = stream.delete_tokens(tok, 3);

        // rewrite every later use spelled the same way
        let pattern_refs: Vec<&str> = pattern.iter().map(|s| s.as_str()).collect();
        let mut search = Some(name_tok);
        while let Some(from) = search {
            let Some(hit) = stream.find_seq(from, &pattern_refs) else { break };
            let lparen = stream.find_seq(hit, &["("]).unwrap();
            stream.erase_range(hit, Some(lparen));
            stream.set_text(hit, name.clone());
            search = stream.next(hit);
        }

        cur = after_head;
    }

    expanded
}

/// Remove orphan `template < > Name ...` heads and collapse
/// `Type < T , U > (` into the single identifier `Type<T,U>` before a call.
pub fn cleanup_after_simplify(stream: &mut TokenStream) {
    let mut cur = stream.front();
    while let Some(tok) = cur {
        if stream.text(tok) == "(" {
            if let Some(close) = stream.link(tok) {
                cur = stream.next(close);
                continue;
            }
        } else if stream.seq_matches(tok, &["template", "<", ">"])
            && stream.at(tok, 3).is_some_and(|t| stream.token(t).is_name())
        {
            // orphan specialization head: delete through ; or the body
            let mut end = stream.at(tok, 1);
            let end = loop {
                let Some(t) = end else { break None };
                match stream.text(t) {
                    ";" => break Some(t),
                    "{" => break stream.link(t).and_then(|c| stream.next(c)),
                    "<" | ">" | ">>" | "," | "::" => {}
                    _ if stream.token(t).is_name() => {}
                    _ => break None,
                }
                end = stream.next(t);
            };
            if let Some(end) = end {
                stream.erase_range(tok, Some(end));
                cur = stream.delete_token(tok);
                continue;
            }
        } else if stream.token(tok).is_name()
            && stream.text_is(tok, 1, "<")
            && stream.prev(tok).map_or(true, |p| stream.text(p) == ";")
        {
            // Type < t1 , ... , tn > (  =>  Type<t1,...,tn> (
            let mut parts = String::new();
            let mut tok2 = stream.at(tok, 2);
            loop {
                let Some(t) = tok2 else { break };
                let tt = stream.token(t);
                if (tt.is_name() || tt.is_number()) && stream.text_is(t, 1, ",") {
                    parts.push_str(tt.text());
                    parts.push(',');
                    tok2 = stream.at(t, 2);
                } else {
                    break;
                }
            }
            let end_ok = tok2.is_some_and(|t| {
                let tt = stream.token(t);
                (tt.is_name() || tt.is_number())
                    && stream.text_is(t, 1, ">")
                    && stream.text_is(t, 2, "(")
            });
            if end_ok {
                let last = tok2.unwrap();
                parts.push_str(stream.text(last));
                let merged = format!("{}<{}>", stream.text(tok), parts);
                stream.set_text(tok, merged);
                let lparen = stream.at(last, 2);
                stream.erase_range(tok, lparen);
                if Some(tok) == stream.front() {
                    // re-examine the renamed head token
                    cur = Some(tok);
                    continue;
                }
            }
        }
        cur = stream.next(tok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_specialized_function() {
        let mut stream =
            tokenize("template < > void g < int > ( ) { } g < int > ( ) ;", 0).unwrap();
        let expanded = expand_specialized(&mut stream);
        assert_eq!(stream.render(), "void g<int> ( ) { } g<int> ( ) ;");
        assert!(expanded.contains("g<int>"));
    }

    #[test]
    fn test_expand_specialized_rewrites_every_call() {
        let mut stream = tokenize(
            "template < > int f < char > ( ) { return 1 ; } int a = f < char > ( ) ; int b = f < char > ( ) ;",
            0,
        )
        .unwrap();
        expand_specialized(&mut stream);
        assert_eq!(
            stream.render(),
            "int f<char> ( ) { return 1 ; } int a = f<char> ( ) ; int b = f<char> ( ) ;"
        );
    }

    #[test]
    fn test_expand_specialized_ignores_plain_templates() {
        let code = "template < class T > T f ( T x ) { return x ; }";
        let mut stream = tokenize(code, 0).unwrap();
        let expanded = expand_specialized(&mut stream);
        assert_eq!(stream.render(), code);
        assert!(expanded.is_empty());
    }

    #[test]
    fn test_cleanup_removes_orphan_head() {
        let mut stream = tokenize("template < > class Foo < int > ; int x ;", 0).unwrap();
        cleanup_after_simplify(&mut stream);
        assert_eq!(stream.render(), "; int x ;");
    }

    #[test]
    fn test_cleanup_removes_orphan_head_with_body() {
        let mut stream = tokenize("template < > class Foo < int > { } int x ;", 0).unwrap();
        cleanup_after_simplify(&mut stream);
        assert_eq!(stream.render(), "int x ;");
    }

    #[test]
    fn test_cleanup_collapses_call_name() {
        let mut stream = tokenize("; Type < T , U > ( ) ;", 0).unwrap();
        cleanup_after_simplify(&mut stream);
        assert_eq!(stream.render(), "; Type<T,U> ( ) ;");
    }

    #[test]
    fn test_cleanup_collapse_only_before_call() {
        let code = "; Type < T > * p ;";
        let mut stream = tokenize(code, 0).unwrap();
        cleanup_after_simplify(&mut stream);
        assert_eq!(stream.render(), code);
    }

    #[test]
    fn test_cleanup_collapse_at_stream_start() {
        let mut stream = tokenize("Type < int > ( ) ;", 0).unwrap();
        cleanup_after_simplify(&mut stream);
        assert_eq!(stream.render(), "Type<int> ( ) ;");
    }
}
