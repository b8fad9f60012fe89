//! Removing a fully instantiated generic declaration from the stream.

use crate::stream::TokenStream;
use crate::token::TokenId;

/// Delete the declaration starting at `tok` (its `template` token) through
/// the end of its body, merging a trailing `;`. Constructors marked
/// `explicit` and plain function definitions right after the head keep their
/// bodies; stray `)` / `}` before the body indicate garbage and only the
/// head is dropped. Returns true when a full declaration was removed.
pub fn remove_template(stream: &mut TokenStream, tok: TokenId) -> bool {
    if !stream.seq_matches(tok, &["template", "<"]) {
        return false;
    }

    let mut indent = 0i32;
    let mut countgt = 0u32;
    let mut cur = stream.next(tok);
    while let Some(tok2) = cur {
        match stream.text(tok2) {
            "(" => {
                match stream.link(tok2) {
                    Some(close) => {
                        cur = stream.next(close);
                        continue;
                    }
                    None => return false,
                }
            }
            ")" => {
                // garbage before the body
                stream.erase_range(tok, Some(tok2));
                stream.delete_token(tok);
                return false;
            }
            "{" => {
                let end = stream.link(tok2).and_then(|c| stream.next(c));
                stream.erase_range(tok, end);
                if let Some(e) = end {
                    if stream.text(e) == ";" && stream.next(e).is_some() {
                        stream.delete_next(tok, 1);
                    }
                }
                stream.delete_token(tok);
                return true;
            }
            "}" => {
                stream.erase_range(tok, Some(tok2));
                stream.delete_token(tok);
                return false;
            }
            _ => {}
        }

        if stream.text(tok2) == ">" {
            countgt += 1;
        }

        // a constructor or function definition straight after the head is
        // not purely generic; keep it
        let ctor = stream.text(tok2) == "explicit"
            || (countgt == 1
                && stream.text_at(tok2, -1) == Some(">")
                && stream.token(tok2).is_name()
                && stream.text_is(tok2, 1, "(")
                && stream
                    .next(tok2)
                    .and_then(|open| stream.link(open))
                    .is_some_and(|close| stream.text_is(close, 1, "{")));
        if ctor {
            stream.erase_range(tok, Some(tok2));
            stream.delete_token(tok);
            return true;
        }

        if stream.text(tok2) == ";" {
            let end = stream.next(tok2);
            stream.erase_range(tok, end);
            stream.delete_token(tok);
            return true;
        }

        if stream.text(tok2) == "<" {
            indent += 1;
        } else if indent >= 2 && stream.text(tok2) == ">" {
            indent -= 1;
        } else if stream.text(tok2) == ">"
            && matches!(stream.text_at(tok2, 1), Some("class") | Some("struct"))
            && stream.at(tok2, 2).is_some_and(|t| stream.token(t).is_name())
            && matches!(stream.text_at(tok2, 3), Some(",") | Some(")"))
        {
            let end = stream.next(tok2);
            stream.erase_range(tok, end);
            stream.delete_token(tok);
            return true;
        }

        cur = stream.next(tok2);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn removed(code: &str) -> (String, bool) {
        let mut stream = tokenize(code, 0).unwrap();
        let tok = stream.front().unwrap();
        let result = remove_template(&mut stream, tok);
        (stream.render(), result)
    }

    #[test]
    fn test_class_with_body() {
        let (out, ok) = removed("template < class T > struct A { T x ; } ; int y ;");
        assert!(ok);
        assert_eq!(out, "int y ;");
    }

    #[test]
    fn test_function_with_body() {
        let (out, ok) = removed("template < class T > T f ( T x ) { return x ; } int y ;");
        assert!(ok);
        assert_eq!(out, "int y ;");
    }

    #[test]
    fn test_declaration_only() {
        let (out, ok) = removed("template < class T > struct A ; int y ;");
        assert!(ok);
        assert_eq!(out, "int y ;");
    }

    #[test]
    fn test_explicit_constructor_is_preserved() {
        let (out, ok) = removed("template < class T > explicit A ( T x ) { } int y ;");
        assert!(ok);
        assert_eq!(out, "explicit A ( T x ) { } int y ;");
    }

    #[test]
    fn test_function_after_head_is_preserved() {
        let (out, ok) = removed("template < class T > f ( int x ) { } int y ;");
        assert!(ok);
        assert_eq!(out, "f ( int x ) { } int y ;");
    }

    #[test]
    fn test_garbage_close_brace() {
        let mut stream = tokenize("{ template < class T > } int y ;", 0).unwrap();
        let tok = stream.at(stream.front().unwrap(), 1).unwrap();
        assert!(!remove_template(&mut stream, tok));
        assert_eq!(stream.render(), "{ } int y ;");
    }

    #[test]
    fn test_garbage_close_paren() {
        use crate::token::Token;
        let mut stream = TokenStream::new();
        for t in ["template", "<", "class", "T", ")", "int", "y", ";"] {
            stream.push_back(Token::new(t, 0, 1));
        }
        let tok = stream.front().unwrap();
        assert!(!remove_template(&mut stream, tok));
        assert_eq!(stream.render(), ") int y ;");
    }

    #[test]
    fn test_not_a_template() {
        let (out, ok) = removed("int y ;");
        assert!(!ok);
        assert_eq!(out, "int y ;");
    }
}
