//! Angle-bracket balance probe for template expressions.

use std::collections::HashSet;

use crate::stream::TokenStream;
use crate::token::TokenId;

/// Check each statement that uses `Type <` for matching angle brackets,
/// counting a `<` as an opener only when the context says it starts a
/// template argument list. Executing scopes are skipped wholesale. Returns
/// the first token of the first statement whose level never closes.
pub fn find_unbalanced_angle_brackets(stream: &TokenStream) -> Option<TokenId> {
    let mut cur = stream.front();
    while let Some(start) = cur {
        let mut tok = start;

        // skip executing scopes: ( { ... } )
        if stream.text(tok) == "(" && stream.text_is(tok, 1, "{") {
            if let Some(close) = stream.link(tok) {
                tok = close;
            }
        }

        // ) { ... }   ) name { ... }   ;|,|= { ... }
        let block = (stream.text(tok) == ")"
            && (stream.text_is(tok, 1, "{")
                || (stream.at(tok, 1).is_some_and(|t| stream.token(t).is_name())
                    && stream.text_is(tok, 2, "{"))))
            || (matches!(stream.text(tok), ";" | "," | "=") && stream.text_is(tok, 1, "{"));
        if block {
            let mut t = tok;
            while stream.text(t) != "{" {
                match stream.next(t) {
                    Some(n) => t = n,
                    None => return None,
                }
            }
            match stream.link(t) {
                Some(close) => tok = close,
                None => return None,
            }
        } else if stream.text(tok) == "try" && stream.text_is(tok, 1, "{") {
            // try { ... } catch ( ... ) { ... }
            match stream.next(tok).and_then(|t| stream.link(t)) {
                Some(close) => tok = close,
                None => return None,
            }
            while stream.text(tok) == "}"
                && stream.text_is(tok, 1, "catch")
                && stream.text_is(tok, 2, "(")
            {
                match stream.at(tok, 2).and_then(|t| stream.link(t)) {
                    Some(close) => tok = close,
                    None => return None,
                }
                if stream.text(tok) == ")" && stream.text_is(tok, 1, "{") {
                    match stream.next(tok).and_then(|t| stream.link(t)) {
                        Some(close) => tok = close,
                        None => return None,
                    }
                }
            }
        }

        // only statement starts are interesting
        if stream.prev(tok).is_some() && !matches!(stream.text(tok), ";" | "{" | "}") {
            cur = stream.next(tok);
            continue;
        }

        // skip statement leaders: ;;; typedef typename foo::bar::..
        let mut t = Some(tok);
        while let Some(x) = t {
            if matches!(stream.text(x), ";" | "{" | "}") {
                t = stream.next(x);
            } else {
                break;
            }
        }
        while let Some(x) = t {
            if matches!(stream.text(x), "typedef" | "typename") {
                t = stream.next(x);
            } else {
                break;
            }
        }
        while let Some(x) = t {
            if stream.token(x).is_name() && stream.text_is(x, 1, "::") {
                t = stream.at(x, 2);
            } else {
                break;
            }
        }
        let Some(tok) = t else { return None };

        if stream.token(tok).is_name() && stream.text_is(tok, 1, "<") {
            // parse the statement, matching < against > and >>
            let mut usedtypes: HashSet<String> = HashSet::new();
            let mut level = 0u32;
            let mut tok2_cur = Some(tok);
            while let Some(mut tok2) = tok2_cur {
                if matches!(stream.text(tok2), ";" | "{" | "}") {
                    break;
                }
                match stream.text(tok2) {
                    "(" => {
                        if let Some(close) = stream.link(tok2) {
                            tok2 = close;
                        }
                    }
                    "<" => {
                        let before_name = stream
                            .at(tok2, -2)
                            .is_some_and(|t| matches!(stream.text(t), "<" | ","))
                            && stream.at(tok2, -1).is_some_and(|t| stream.token(t).is_name());
                        let mut inclevel = false;
                        if stream.text_at(tok2, -1) == Some("operator") {
                            // comparison operator declaration
                        } else if level == 0 {
                            inclevel = true;
                        } else if stream
                            .at(tok2, 1)
                            .is_some_and(|t| stream.token(t).is_standard_type())
                        {
                            inclevel = true;
                        } else if stream.text_at(tok2, 1) == Some("typename") {
                            inclevel = true;
                        } else if before_name
                            && usedtypes.contains(stream.text_at(tok2, -1).unwrap())
                        {
                            inclevel = true;
                        } else if stream
                            .at(tok2, 1)
                            .is_some_and(|t| stream.token(t).is_name())
                            && usedtypes.contains(stream.text_at(tok2, 1).unwrap())
                        {
                            inclevel = true;
                        } else if stream.at(tok2, 1).is_some_and(|t| stream.token(t).is_name()) {
                            // assume a type when another < follows
                            let mut tok3 = stream.next(tok2);
                            while let Some(x) = tok3 {
                                if stream.token(x).is_name() && stream.text_is(x, 1, "::") {
                                    tok3 = stream.at(x, 2);
                                } else {
                                    break;
                                }
                            }
                            if tok3.is_some_and(|x| {
                                stream.token(x).is_name() && stream.text_is(x, 1, "<")
                            }) {
                                inclevel = true;
                            }
                        }
                        if inclevel {
                            level += 1;
                            if before_name {
                                usedtypes.insert(stream.text_at(tok2, -1).unwrap().to_string());
                            }
                        }
                    }
                    ">" => {
                        if level > 0 {
                            level -= 1;
                        }
                    }
                    ">>" => {
                        if level > 0 {
                            level -= 1;
                        }
                        if level > 0 {
                            level -= 1;
                        }
                    }
                    _ => {}
                }
                tok2_cur = stream.next(tok2);
            }
            if level > 0 {
                return Some(tok);
            }
        }

        cur = stream.next(tok);
    }
    None
}
