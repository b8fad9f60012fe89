//! Locating template declarations and candidate instantiation sites.

use crate::params::template_parameters;
use crate::stream::TokenStream;
use crate::token::TokenId;

/// Worklist of instantiation sites.
///
/// The engine appends while it drains, and earlier passes retire entries
/// whose tokens are about to be erased. Retired slots stay in place so
/// in-flight iteration indexes remain valid; ids of erased tokens must be
/// retired before the erase because slot ids are recycled.
#[derive(Debug, Default)]
pub struct InstantiationList {
    items: Vec<Option<TokenId>>,
}

impl InstantiationList {
    pub fn push(&mut self, id: TokenId) {
        self.items.push(Some(id));
    }

    /// Drop every entry referring to `id`.
    pub fn retire(&mut self, id: TokenId) {
        for slot in &mut self.items {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    pub fn contains(&self, id: TokenId) -> bool {
        self.items.contains(&Some(id))
    }

    /// Number of live entries.
    pub fn live_len(&self) -> usize {
        self.items.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_len() == 0
    }

    /// Total slot count; `get` returns None for retired slots.
    pub fn slot_len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, index: usize) -> Option<TokenId> {
        self.items.get(index).copied().flatten()
    }

    pub fn live(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.items.iter().filter_map(|s| *s)
    }
}

/// Collect the `template` tokens of declarations that carry a body, skipping
/// namespace bodies wholesale. The bool is the `code_with_templates` flag:
/// true as soon as any `template <` was seen, body or not.
pub fn template_declarations(stream: &TokenStream) -> (Vec<TokenId>, bool) {
    let mut templates = Vec::new();
    let mut code_with_templates = false;

    let mut cur = stream.front();
    while let Some(mut tok) = cur {
        // templates inside namespaces are out of scope
        if stream.text(tok) == "namespace"
            && stream.at(tok, 1).is_some_and(|t| stream.token(t).is_name())
            && stream.text_is(tok, 2, "{")
        {
            if let Some(close) = stream.at(tok, 2).and_then(|t| stream.link(t)) {
                tok = close;
            }
        }

        if stream.seq_matches(tok, &["template", "<"]) {
            code_with_templates = true;
            let mut tok2 = Some(tok);
            while let Some(t) = tok2 {
                match stream.text(t) {
                    // forward declaration without a body
                    ";" => break,
                    "{" => {
                        templates.push(tok);
                        break;
                    }
                    _ => tok2 = stream.next(t),
                }
            }
        }
        cur = stream.next(tok);
    }
    (templates, code_with_templates)
}

/// Collect candidate instantiation sites: identifiers followed by `<` whose
/// left context is a use. For each site, inner `, Id <` instantiations are
/// recorded before the outer one so nested expansion runs bottom-up.
pub fn template_instantiations(stream: &TokenStream) -> InstantiationList {
    let mut used = InstantiationList::default();

    let mut cur = stream.front();
    while let Some(tok) = cur {
        // skip template heads
        if stream.seq_matches(tok, &["template", "<"]) {
            let Some(close) = stream
                .next(tok)
                .and_then(|lt| stream.find_closing_bracket(lt))
            else {
                break;
            };
            cur = stream.next(close);
            continue;
        }

        let use_context = stream.token(tok).is_name()
            && stream.text_is(tok, 1, "<")
            && (match stream.prev(tok) {
                Some(p) => {
                    matches!(stream.text(p), "(" | "{" | "}" | ";" | "=" | ",")
                        || stream.token(p).is_name()
                            && !matches!(stream.text(p), "private" | "protected" | "public")
                        || (matches!(stream.text(p), "private" | "protected" | "public")
                            && stream
                                .at(tok, -2)
                                .is_some_and(|t| matches!(stream.text(t), "," | ":")))
                }
                None => false,
            });

        if use_context {
            // inner instantiations first: walk backwards from the closer
            let closer = stream
                .next(tok)
                .and_then(|lt| stream.find_closing_bracket(lt));
            let mut tok2 = closer;
            while let Some(t) = tok2 {
                if t == tok {
                    break;
                }
                if stream.text(t) == ","
                    && stream.at(t, 1).is_some_and(|n| stream.token(n).is_name())
                    && stream.text_is(t, 2, "<")
                    && template_parameters(stream, stream.at(t, 2)) > 0
                {
                    used.push(stream.next(t).unwrap());
                }
                tok2 = stream.prev(t);
            }
            // then the outer one
            if template_parameters(stream, stream.next(tok)) > 0 {
                used.push(tok);
            }
        }
        cur = stream.next(tok);
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn decls(code: &str) -> (Vec<String>, bool) {
        let stream = tokenize(code, 0).unwrap();
        let (ids, flag) = template_declarations(&stream);
        (ids.iter().map(|&t| stream.text(t).to_string()).collect(), flag)
    }

    fn sites(code: &str) -> Vec<String> {
        let stream = tokenize(code, 0).unwrap();
        template_instantiations(&stream)
            .live()
            .map(|t| stream.text(t).to_string())
            .collect()
    }

    #[test]
    fn test_declaration_with_body_is_collected() {
        let (found, flag) = decls("template < class T > struct A { } ;");
        assert_eq!(found, vec!["template"]);
        assert!(flag);
    }

    #[test]
    fn test_forward_declaration_is_ignored_but_flagged() {
        let (found, flag) = decls("template < class T > struct A ;");
        assert!(found.is_empty());
        assert!(flag);
    }

    #[test]
    fn test_namespace_bodies_are_skipped() {
        let (found, flag) = decls("namespace N { template < class T > struct A { } ; } int x ;");
        assert!(found.is_empty());
        assert!(!flag);
    }

    #[test]
    fn test_instantiation_after_semicolon() {
        assert_eq!(sites("template < class T > struct A { } ; A < int > a ;"), vec!["A"]);
    }

    #[test]
    fn test_declaration_head_is_not_a_site() {
        assert!(sites("template < class T > T f ( T x ) { return x ; }").is_empty());
    }

    #[test]
    fn test_inner_sites_come_first() {
        // the nested B instantiation is recorded before the outer A
        let found = sites("; A < int , B < char > > x ;");
        assert_eq!(found, vec!["B", "A"]);
    }

    #[test]
    fn test_type_name_context() {
        assert_eq!(sites("void f ( ) { A < int > a ; }"), vec!["A"]);
    }

    #[test]
    fn test_retire_and_growth() {
        let stream = tokenize("; A < int > a ;", 0).unwrap();
        let mut list = template_instantiations(&stream);
        assert_eq!(list.live_len(), 1);
        let site = list.get(0).unwrap();
        list.push(site);
        assert_eq!(list.live_len(), 2);
        list.retire(site);
        assert_eq!(list.live_len(), 0);
        assert_eq!(list.slot_len(), 2);
    }
}
