//! The instantiation engine.
//!
//! For one template declaration this finds every matching instantiation
//! site, forms the mangled name, clones the declaration body with parameters
//! substituted by the site's argument tokens, rewrites the call sites to the
//! mangled single-token name and keeps folding constants whenever the
//! worklist grows. Nested instantiations synthesized while cloning are
//! appended to the worklist, so inner templates expand in later rounds.

use std::collections::HashSet;

use crate::calc::simplify_calculations;
use crate::discover::InstantiationList;
use crate::params::{instantiate_match, template_parameters, AfterPattern};
use crate::report::{ErrorLogger, ErrorMessage, Severity};
use crate::settings::Settings;
use crate::stream::TokenStream;
use crate::token::{Token, TokenId};

/// Offset of the template name relative to the `>` closing the head, or
/// None when the declaration shape is not recognized.
pub fn template_name_position(stream: &TokenStream, gt: TokenId) -> Option<isize> {
    if stream.text(gt) != ">" {
        return None;
    }
    // > class|struct Name {|:
    if matches!(stream.text_at(gt, 1), Some("class") | Some("struct"))
        && stream.at(gt, 2).is_some_and(|t| stream.token(t).is_name())
        && matches!(stream.text_at(gt, 3), Some("{") | Some(":"))
    {
        return Some(2);
    }
    // > Type *|&opt Name (
    if stream.at(gt, 1).is_some_and(|t| stream.token(t).is_name()) {
        if stream.at(gt, 2).is_some_and(|t| stream.token(t).is_name())
            && stream.text_at(gt, 3) == Some("(")
        {
            return Some(2);
        }
        if matches!(stream.text_at(gt, 2), Some("*") | Some("&"))
            && stream.at(gt, 3).is_some_and(|t| stream.token(t).is_name())
            && stream.text_at(gt, 4) == Some("(")
        {
            return Some(3);
        }
        // > Type Type *|&opt Name (
        if stream.at(gt, 2).is_some_and(|t| stream.token(t).is_name()) {
            if stream.at(gt, 3).is_some_and(|t| stream.token(t).is_name())
                && stream.text_at(gt, 4) == Some("(")
            {
                return Some(3);
            }
            if matches!(stream.text_at(gt, 3), Some("*") | Some("&"))
                && stream.at(gt, 4).is_some_and(|t| stream.token(t).is_name())
                && stream.text_at(gt, 5) == Some("(")
            {
                return Some(4);
            }
        }
    }
    None
}

/// Append the canonical text of one argument token to a mangled-name body:
/// `unsigned`/`signed`/`long` flags become word prefixes.
fn push_canonical(out: &mut String, tok: &Token) {
    if tok.is_unsigned {
        out.push_str("unsigned");
    } else if tok.is_signed {
        out.push_str("signed");
    }
    if tok.is_long {
        out.push_str("long");
    }
    out.push_str(tok.text());
}

/// Clone the declaration body (and any out-of-class member definitions of
/// the same template) into the stream tail, substituting parameters with the
/// instantiation's argument tokens and `name` with `new_name`.
#[allow(clippy::too_many_arguments)]
fn expand_template(
    stream: &mut TokenStream,
    decl_gt: TokenId,
    name: &str,
    params: &[TokenId],
    new_name: &str,
    types_used: &[TokenId],
    instantiations: &mut InstantiationList,
) {
    let mut cur = stream.front();
    while let Some(mut tok3) = cur {
        if matches!(stream.text(tok3), "{" | "(" | "[") {
            match stream.link(tok3) {
                Some(close) => tok3 = close,
                None => {
                    cur = stream.next(tok3);
                    continue;
                }
            }
        }

        let start;
        if tok3 == decl_gt {
            // the declaration itself: clone from the token after the head
            start = stream.next(tok3);
        } else if instantiate_match(
            stream,
            tok3,
            name,
            params.len(),
            Some(AfterPattern::MemberFunc),
        ) {
            // member function implemented outside the class body
            let (file, line) = {
                let t = stream.token(tok3);
                (t.file_index, t.line)
            };
            stream.push_back(Token::new(new_name, file, line));
            let mut t = Some(tok3);
            while let Some(x) = t {
                if stream.text(x) == "::" {
                    break;
                }
                t = stream.next(x);
            }
            start = t;
        } else {
            cur = stream.next(tok3);
            continue;
        }

        // clone loop
        let mut indent = 0i32;
        let mut brackets: Vec<TokenId> = Vec::new();
        let mut src = start;
        while let Some(s) = src {
            let (file, line) = {
                let t = stream.token(s);
                (t.file_index, t.line)
            };

            if stream.token(s).is_name() {
                // parameter -> argument token sequence from the site
                if let Some(i) = params
                    .iter()
                    .position(|&p| stream.text(p) == stream.text(s))
                {
                    let mut type_indent = 0i32;
                    let mut tt = types_used.get(i).copied();
                    while let Some(t) = tt {
                        if type_indent == 0 && matches!(stream.text(t), "," | ">" | ">>") {
                            break;
                        }
                        if stream.token(t).is_name()
                            && stream.text_is(t, 1, "<")
                            && template_parameters(stream, stream.next(t)) > 0
                        {
                            type_indent += 1;
                        } else if type_indent > 0 && stream.text(t) == ">" {
                            type_indent -= 1;
                        } else if type_indent > 0 && stream.text(t) == ">>" {
                            if type_indent == 1 {
                                break;
                            }
                            type_indent -= 2;
                        }
                        let clone = stream.token(t).clone_at(file, line);
                        stream.push_back(clone);
                        tt = stream.next(t);
                    }
                    src = stream.next(s);
                    continue;
                }
                // the template's own name becomes the mangled name
                if stream.text(s) == name && !stream.text_is(s, 1, "<") {
                    stream.push_back(Token::new(new_name, file, line));
                    src = stream.next(s);
                    continue;
                }
            }

            // verbatim copy
            let clone = stream.token(s).clone_at(file, line);
            let emitted = stream.push_back(clone);

            if stream.token(s).is_name() && stream.text_is(s, 1, "<") {
                // synthesized instantiation: expand in a later round
                instantiations.push(emitted);
            }

            match stream.text(emitted) {
                "{" => {
                    brackets.push(emitted);
                    indent += 1;
                }
                "(" | "[" => brackets.push(emitted),
                "}" => {
                    debug_assert!(
                        brackets.last().is_some_and(|&b| stream.text(b) == "{"),
                        "unbalanced braces while cloning a template body"
                    );
                    if let Some(open) = brackets.pop() {
                        stream.create_mutual_links(open, emitted);
                    }
                    if indent <= 1 && brackets.is_empty() {
                        // end of this definition; keep a trailing ;
                        if stream.text_is(s, 1, ";") {
                            let semi = Token::new(";", file, line);
                            stream.push_back(semi);
                        }
                        break;
                    }
                    indent -= 1;
                }
                ")" | "]" => {
                    if let Some(open) = brackets.pop() {
                        stream.create_mutual_links(open, emitted);
                    }
                }
                _ => {}
            }

            src = stream.next(s);
        }
        debug_assert!(brackets.is_empty(), "open brackets left after cloning");

        // continue the outer walk after the cloned definition
        cur = src.and_then(|s| stream.next(s));
    }
}

/// Expand every instantiation of the declaration starting at `decl` (its
/// `template` token). Returns true when at least one expansion happened, in
/// which case the caller removes the generic declaration.
pub fn simplify_template_instantiations(
    stream: &mut TokenStream,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
    decl: TokenId,
    instantiations: &mut InstantiationList,
    expanded: &mut HashSet<String>,
) -> bool {
    // parameter identifiers T1..Tk of "template < ... >"
    let mut params: Vec<TokenId> = Vec::new();
    let mut tok = stream.at(decl, 2);
    while let Some(t) = tok {
        if stream.text(t) == ">" {
            break;
        }
        if stream.token(t).is_name()
            && matches!(stream.text_at(t, 1), Some(",") | Some(">"))
        {
            params.push(t);
        }
        tok = stream.next(t);
    }
    // end of file inside the head
    let Some(gt) = tok else { return false };

    let Some(namepos) = template_name_position(stream, gt) else {
        if settings.debug_warnings {
            logger.report_err(ErrorMessage::new(
                stream,
                &[decl],
                Severity::Debug,
                "debug",
                "simplifyTemplates: bailing out",
            ));
        }
        return false;
    };
    let name = stream.text_at(gt, namepos).unwrap().to_string();
    let isfunc = stream.text_at(gt, namepos + 1) == Some("(");

    let mut live = instantiations.live_len();
    let mut recursive_count = 0u32;
    let mut instantiated = false;

    let mut index = 0usize;
    while index < instantiations.slot_len() {
        // whenever the worklist grew, fold constants so freshly exposed
        // non-type arguments mangle in literal form
        if live != instantiations.live_len() {
            live = instantiations.live_len();
            if let Err(err) = simplify_calculations(stream) {
                logger.report_err(ErrorMessage::new(
                    stream,
                    &[err.token()],
                    Severity::Error,
                    "internalError",
                    err.message(),
                ));
            }
            recursive_count += 1;
            if recursive_count > settings.max_instantiation_growth {
                break;
            }
        }

        let Some(tok2) = instantiations.get(index) else {
            index += 1;
            continue;
        };
        index += 1;
        if stream.opt_token(tok2).is_none() || stream.text(tok2) != name {
            continue;
        }

        let statement_start = stream
            .prev(tok2)
            .is_some_and(|p| matches!(stream.text(p), ";" | "{" | "}" | "="));
        if statement_start
            && !instantiate_match(
                stream,
                tok2,
                &name,
                params.len(),
                Some(if isfunc {
                    AfterPattern::OpenParen
                } else {
                    AfterPattern::OptStarName
                }),
            )
        {
            continue;
        }

        // parse the argument tokens of this site
        let mut types_used: Vec<TokenId> = Vec::new();
        let mut type_for_new_name = String::new();
        let mut pattern: Vec<String> = vec![name.clone(), "<".into()];
        let mut indent = 0usize;
        let mut bailed = false;
        let mut uses_own_param = false;

        let mut tok3_cur = stream.at(tok2, 2);
        loop {
            let Some(tok3) = tok3_cur else { break };
            if indent == 0 && stream.text(tok3) == ">" {
                break;
            }
            let text = stream.text(tok3).to_string();
            // unparenthesized ( or [ in an argument: bail out for this site
            if text == "(" || text == "[" {
                bailed = true;
                break;
            }
            if stream.next(tok3).is_none() {
                bailed = true;
                break;
            }
            if text == "<"
                && stream.at(tok3, -1).is_some_and(|t| stream.token(t).is_name())
                && stream
                    .at(tok3, -2)
                    .is_some_and(|t| matches!(stream.text(t), "<" | ","))
                && template_parameters(stream, Some(tok3)) > 0
            {
                indent += 1;
            } else if indent > 0
                && text == ">"
                && matches!(stream.text_at(tok3, 1), Some(",") | Some(">"))
            {
                indent -= 1;
            } else if indent > 0 && text == ">>" {
                if indent == 1 {
                    pattern.push(">".into());
                    type_for_new_name.push('>');
                    break;
                }
                indent -= 2;
            }
            if text == ">>" {
                pattern.push(">".into());
                pattern.push(">".into());
            } else {
                pattern.push(text.clone());
            }
            if indent == 0
                && stream
                    .at(tok3, -1)
                    .is_some_and(|t| matches!(stream.text(t), "<" | ","))
            {
                types_used.push(tok3);
            }
            if text != "class" {
                push_canonical(&mut type_for_new_name, stream.token(tok3));
            }
            if stream.token(tok3).is_name()
                && params.iter().any(|&p| stream.text(p) == stream.text(tok3))
            {
                uses_own_param = true;
            }
            tok3_cur = stream.next(tok3);
        }
        pattern.push(">".into());
        if bailed {
            type_for_new_name.clear();
        }
        // a self-reference inside the declaration body is not a concrete
        // instantiation; expanding it would rebind the open parameters
        if uses_own_param {
            continue;
        }

        if type_for_new_name.is_empty() || params.len() != types_used.len() {
            if settings.debug_warnings {
                logger.report_err(ErrorMessage::new(
                    stream,
                    &[decl],
                    Severity::Debug,
                    "debug",
                    "Failed to instantiate template. The checking continues anyway.",
                ));
            }
            if type_for_new_name.is_empty() {
                continue;
            }
            break;
        }

        let new_name = format!("{}<{}>", name, type_for_new_name);
        if !expanded.contains(&new_name) {
            expanded.insert(new_name.clone());
            expand_template(stream, gt, &name, &params, &new_name, &types_used, instantiations);
            instantiated = true;
        }

        // replace every call site spelled with an equivalent argument list
        let pattern_refs: Vec<&str> = pattern.iter().map(|s| s.as_str()).collect();
        let mut removals: Vec<(TokenId, Option<TokenId>)> = Vec::new();
        let mut tok4_cur = Some(tok2);
        while let Some(tok4) = tok4_cur {
            if !stream.seq_matches(tok4, &pattern_refs) {
                tok4_cur = stream.next(tok4);
                continue;
            }

            let mut tok5_cur = stream.at(tok4, 2);
            let mut type_count = 1usize;
            let mut typetok = types_used.first().copied();
            let mut indent5 = 0usize;
            let mut equivalent = true;
            loop {
                let Some(tok5) = tok5_cur else { break };
                if indent5 == 0 && stream.text(tok5) == ">" {
                    break;
                }
                if stream.text(tok5) == "<"
                    && template_parameters(stream, Some(tok5)) > 0
                {
                    indent5 += 1;
                } else if indent5 > 0
                    && stream.text(tok5) == ">"
                    && matches!(stream.text_at(tok5, 1), Some(",") | Some(">"))
                {
                    indent5 -= 1;
                } else if indent5 == 0 {
                    if stream.text(tok5) != "," {
                        let matches_flags = typetok.is_some_and(|tt| {
                            let a = stream.token(tok5);
                            let b = stream.token(tt);
                            a.is_unsigned == b.is_unsigned
                                && a.is_signed == b.is_signed
                                && a.is_long == b.is_long
                        });
                        if !matches_flags {
                            equivalent = false;
                            break;
                        }
                        typetok = typetok.and_then(|tt| stream.next(tt));
                    } else {
                        typetok = types_used.get(type_count).copied();
                        type_count += 1;
                    }
                }
                tok5_cur = stream.next(tok5);
            }

            let closer = tok5_cur;
            if equivalent {
                if let Some(gt5) = closer {
                    if stream.text(gt5) == ">" && type_count == types_used.len() {
                        stream.set_text(tok4, new_name.clone());
                        let mut tok6 = stream.next(tok4);
                        while let Some(t6) = tok6 {
                            if t6 == gt5 {
                                break;
                            }
                            if stream.token(t6).is_name() {
                                instantiations.retire(t6);
                            }
                            tok6 = stream.next(t6);
                        }
                        removals.push((tok4, stream.next(gt5)));
                    }
                }
            }

            match closer {
                Some(t5) => tok4_cur = stream.next(t5),
                None => break,
            }
        }
        for (from, to) in removals.into_iter().rev() {
            stream.erase_range(from, to);
        }
    }

    instantiated
}
