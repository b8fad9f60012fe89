//! Propagating defaulted template parameters into instantiation sites.

use crate::discover::InstantiationList;
use crate::params::template_parameters;
use crate::stream::TokenStream;
use crate::token::TokenId;

/// For every class-template declaration with defaulted parameters, splice
/// the default value sequences into instantiations that supply fewer
/// arguments, then strip the `= value` parts from the declaration.
///
/// Instantiation-list entries that point into a default expression are
/// retired; expanding them separately would bind the wrong parameters.
pub fn use_default_argument_values(
    stream: &mut TokenStream,
    templates: &[TokenId],
    instantiations: &mut InstantiationList,
) {
    for &decl in templates {
        // the '=' of each defaulted parameter, in declaration order
        let mut eq: Vec<TokenId> = Vec::new();
        // total number of declared parameters
        let mut template_par = 1usize;
        // set for class templates only; function templates are skipped
        let mut classname = String::new();

        // scan the parameter list; nested <...> in default values is skipped
        let mut level = 0i32;
        let mut tok = Some(decl);
        while let Some(t) = tok {
            match stream.text(t) {
                "<" => level += 1,
                ">" => {
                    level -= 1;
                    if level == 0 {
                        if matches!(stream.text_at(t, 1), Some("class") | Some("struct"))
                            && stream.at(t, 2).is_some_and(|n| stream.token(n).is_name())
                        {
                            classname = stream.text_at(t, 2).unwrap().to_string();
                        }
                        break;
                    }
                }
                ">>" => {
                    level -= 2;
                    if level <= 0 {
                        break;
                    }
                }
                "," if level == 1 => template_par += 1,
                "=" if level == 1 => eq.push(t),
                _ => {}
            }
            tok = stream.next(t);
        }
        if eq.is_empty() || classname.is_empty() {
            continue;
        }

        // splice defaults into every shorter instantiation
        let site_tokens: Vec<TokenId> = instantiations.live().collect();
        for site in site_tokens {
            if stream.opt_token(site).is_none()
                || stream.text(site) != classname
                || !stream.text_is(site, 1, "<")
                || stream.at(site, 2).is_none()
            {
                continue;
            }

            // count supplied arguments; multi-token arguments end the scan
            let mut used_par = 1usize;
            let mut tok = stream.at(site, 3);
            loop {
                let Some(t) = tok else { break };
                match stream.text(t) {
                    ">" => break,
                    "," => used_par += 1,
                    _ => {
                        tok = None;
                        break;
                    }
                }
                tok = stream.at(t, 2);
            }
            let Some(gt) = tok else { continue };
            if stream.text(gt) != ">" {
                continue;
            }

            // skip the defaults already covered by supplied arguments
            let mut idx = 0usize;
            let mut i = template_par.saturating_sub(eq.len());
            while idx < eq.len() && i < used_par {
                idx += 1;
                i += 1;
            }

            let mut insert_at = stream.prev(gt).unwrap();
            while idx < eq.len() {
                let (file, line) = {
                    let t = stream.token(insert_at);
                    (t.file_index, t.line)
                };
                insert_at = stream.insert_after(
                    insert_at,
                    crate::token::Token::new(",", file, line),
                );
                // clone the default value up to the , or > at nesting level
                // zero, relinking ( ) and [ ] pairs; >> drops two levels
                let mut links: Vec<TokenId> = Vec::new();
                let mut angle = 0i32;
                let mut from = stream.next(eq[idx]);
                while let Some(f) = from {
                    if links.is_empty() {
                        match stream.text(f) {
                            "," if angle == 0 => break,
                            ">" => {
                                if angle == 0 {
                                    break;
                                }
                                angle -= 1;
                            }
                            ">>" => {
                                if angle < 2 {
                                    break;
                                }
                                angle -= 2;
                            }
                            "<" => angle += 1,
                            _ => {}
                        }
                    }
                    let clone = stream.token(f).clone_at(file, line);
                    insert_at = stream.insert_after(insert_at, clone);
                    if matches!(stream.text(insert_at), "(" | "[") {
                        links.push(insert_at);
                    } else if !links.is_empty()
                        && matches!(stream.text(insert_at), ")" | "]")
                    {
                        let open = links.pop().unwrap();
                        stream.create_mutual_links(open, insert_at);
                    }
                    from = stream.next(f);
                }
                idx += 1;
            }
        }

        // remove the defaults from the declaration
        for eqtok in eq {
            let mut indent: i32 = 0;
            let mut tok2 = stream.next(eqtok);
            let mut end = None;
            while let Some(t2) = tok2 {
                let text = stream.text(t2);
                if text == "(" {
                    match stream.link(t2) {
                        Some(close) => {
                            tok2 = stream.next(close);
                            continue;
                        }
                        None => break,
                    }
                } else if stream.token(t2).is_name()
                    && stream.text_is(t2, 1, "<")
                    && template_parameters(stream, stream.next(t2)) > 0
                {
                    instantiations.retire(t2);
                    indent += 1;
                } else if indent > 0 && text == ">" {
                    indent -= 1;
                } else if indent > 0 && text == ">>" {
                    indent -= 2;
                    if indent < 0 {
                        // this closer is shared with the declaration head
                        stream.set_text(t2, ">");
                    }
                } else if indent == 0 && matches!(text, "," | ">" | ">>") {
                    end = Some(t2);
                    break;
                }
                if indent < 0 {
                    end = Some(t2);
                    break;
                }
                tok2 = stream.next(t2);
            }
            stream.erase_range(eqtok, end);
            stream.delete_token(eqtok);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::{template_declarations, template_instantiations};
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn apply(code: &str) -> String {
        let mut stream = tokenize(code, 0).unwrap();
        let (templates, _) = template_declarations(&stream);
        let mut insts = template_instantiations(&stream);
        use_default_argument_values(&mut stream, &templates, &mut insts);
        stream.render()
    }

    #[test]
    fn test_default_is_spliced_and_stripped() {
        assert_eq!(
            apply("template < class T , class U = int > struct P { } ; P < char > p ;"),
            "template < class T , class U > struct P { } ; P < char , int > p ;"
        );
    }

    #[test]
    fn test_full_argument_list_is_untouched() {
        assert_eq!(
            apply("template < class T , class U = int > struct P { } ; P < char , long > p ;"),
            "template < class T , class U > struct P { } ; P < char , long > p ;"
        );
    }

    #[test]
    fn test_two_defaults() {
        assert_eq!(
            apply("template < class T , class U = int , class V = char > struct P { } ; P < long > p ;"),
            "template < class T , class U , class V > struct P { } ; P < long , int , char > p ;"
        );
    }

    #[test]
    fn test_function_templates_are_skipped() {
        let code = "template < class T > T f ( T x = 0 ) { return x ; } int y = f < int > ( ) ;";
        assert_eq!(apply(code), code);
    }

    #[test]
    fn test_instantiation_inside_default_is_retired() {
        let code = "template < class T , class U = A < int > > struct P { } ; P < char > p ;";
        let mut stream = tokenize(code, 0).unwrap();
        let (templates, _) = template_declarations(&stream);
        let mut insts = template_instantiations(&stream);
        use_default_argument_values(&mut stream, &templates, &mut insts);
        assert_eq!(
            stream.render(),
            "template < class T , class U > struct P { } ; P < char , A < int > > p ;"
        );
        // only the P site survives; the A in the default expression is gone
        let live: Vec<String> = insts.live().map(|t| stream.text(t).to_string()).collect();
        assert_eq!(live, vec!["P"]);
    }
}
