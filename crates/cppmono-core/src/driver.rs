//! The top-level simplification pipeline.

use crate::calc::simplify_calculations;
use crate::defaults::use_default_argument_values;
use crate::discover::{template_declarations, template_instantiations};
use crate::expand::simplify_template_instantiations;
use crate::remove::remove_template;
use crate::report::{ErrorLogger, ErrorMessage, Severity};
use crate::settings::Settings;
use crate::specialize::{cleanup_after_simplify, expand_specialized};
use crate::stream::TokenStream;

/// Fold constants until nothing changes. A math error aborts the fold and
/// is surfaced through the logger; the stream keeps whatever was folded so
/// far.
pub fn fold_constants_logged(stream: &mut TokenStream, logger: &mut dyn ErrorLogger) -> bool {
    let mut changed = false;
    loop {
        match simplify_calculations(stream) {
            Ok(true) => changed = true,
            Ok(false) => break,
            Err(err) => {
                logger.report_err(ErrorMessage::new(
                    stream,
                    &[err.token()],
                    Severity::Error,
                    "internalError",
                    err.message(),
                ));
                break;
            }
        }
    }
    changed
}

/// Run the whole template simplification over `stream`: rename explicit
/// specializations, discover declarations and instantiation sites,
/// materialize default arguments, expand each declaration (innermost-first)
/// and strip the instantiated generics. Returns the `code_with_templates`
/// flag.
pub fn simplify_templates(
    stream: &mut TokenStream,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> bool {
    // reduce non-type arguments to literal form before anything is mangled
    fold_constants_logged(stream, logger);

    let mut expanded = expand_specialized(stream);

    let (mut templates, code_with_templates) = template_declarations(stream);
    tracing::debug!(declarations = templates.len(), "template discovery");
    if templates.is_empty() {
        return code_with_templates;
    }

    // drop stray "typename" outside template heads
    let mut cur = stream.front();
    while let Some(tok) = cur {
        if stream.text(tok) == "typename" {
            cur = stream.delete_token(tok);
            continue;
        }
        if stream.seq_matches(tok, &["template", "<"]) {
            let mut t = Some(tok);
            while let Some(x) = t {
                if stream.text(x) == ">" {
                    break;
                }
                t = stream.next(x);
            }
            let Some(gt) = t else { break };
            cur = stream.next(gt);
            continue;
        }
        cur = stream.next(tok);
    }

    let mut instantiations = template_instantiations(stream);
    tracing::debug!(sites = instantiations.live_len(), "instantiation discovery");
    if instantiations.is_empty() {
        return code_with_templates;
    }

    use_default_argument_values(stream, &templates, &mut instantiations);

    // expand in reverse discovery order so nested declarations go first
    let mut done = Vec::new();
    for &decl in templates.iter().rev() {
        if simplify_template_instantiations(
            stream,
            logger,
            settings,
            decl,
            &mut instantiations,
            &mut expanded,
        ) {
            done.push(decl);
        }
    }

    for decl in done {
        templates.retain(|&t| t != decl);
        remove_template(stream, decl);
    }

    cleanup_after_simplify(stream);

    code_with_templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{simplify_std_types, tokenize};
    use crate::report::CollectingLogger;
    use pretty_assertions::assert_eq;

    fn simplify(code: &str) -> String {
        let mut stream = tokenize(code, 0).unwrap();
        simplify_std_types(&mut stream);
        let mut logger = CollectingLogger::default();
        simplify_templates(&mut stream, &mut logger, &Settings::default());
        assert!(stream.check_links().is_none(), "bracket links broken");
        stream.render()
    }

    #[test]
    fn test_function_template() {
        assert_eq!(
            simplify("template < class T > T f ( T x ) { return x ; } int a = f < int > ( 3 ) ;"),
            "int a = f<int> ( 3 ) ; int f<int> ( int x ) { return x ; }"
        );
    }

    #[test]
    fn test_class_template_with_default_argument() {
        assert_eq!(
            simplify("template < class T , class U = int > struct P { } ; P < char > p ;"),
            "P<char,int> p ; struct P<char,int> { } ;"
        );
    }

    #[test]
    fn test_non_type_argument_folds_before_mangling() {
        let out = simplify("template < int N > struct A { } ; A < 1 + 2 > a ;");
        assert_eq!(out, "A<3> a ; struct A<3> { } ;");
        assert!(!out.contains("A<1+2>"));
    }

    #[test]
    fn test_explicit_specialization() {
        assert_eq!(
            simplify("template < > void g < int > ( ) { } g < int > ( ) ;"),
            "void g<int> ( ) { } g<int> ( ) ;"
        );
    }

    #[test]
    fn test_self_referential_class() {
        assert_eq!(
            simplify(
                "template < class T > struct S { S < T > * next ; } ; S < int > s ;"
            ),
            "S<int> s ; struct S<int> { S<int> * next ; } ;"
        );
    }

    #[test]
    fn test_two_instantiations_share_one_expansion() {
        assert_eq!(
            simplify(
                "template < class T > T f ( T x ) { return x ; } int a = f < int > ( 1 ) ; int b = f < int > ( 2 ) ;"
            ),
            "int a = f<int> ( 1 ) ; int b = f<int> ( 2 ) ; int f<int> ( int x ) { return x ; }"
        );
    }

    #[test]
    fn test_distinct_arguments_expand_separately() {
        assert_eq!(
            simplify(
                "template < class T > struct A { T x ; } ; A < int > a ; A < char > b ;"
            ),
            "A<int> a ; A<char> b ; struct A<int> { int x ; } ; struct A<char> { char x ; } ;"
        );
    }

    #[test]
    fn test_unsigned_flag_distinguishes_instantiations() {
        let out = simplify(
            "template < class T > struct A { } ; A < unsigned int > a ; A < int > b ;",
        );
        assert_eq!(
            out,
            "A<unsignedint> a ; A<int> b ; struct A<unsignedint> { } ; struct A<int> { } ;"
        );
    }

    #[test]
    fn test_code_with_templates_flag() {
        let mut stream = tokenize("template < class T > struct A ; int x ;", 0).unwrap();
        let mut logger = CollectingLogger::default();
        let flag = simplify_templates(&mut stream, &mut logger, &Settings::default());
        assert!(flag);

        let mut stream = tokenize("int x ;", 0).unwrap();
        let flag = simplify_templates(&mut stream, &mut logger, &Settings::default());
        assert!(!flag);
    }

    #[test]
    fn test_bailout_emits_debug_message() {
        let mut stream = tokenize(
            "template < class T > operator + ( ) { } A < int > a ;",
            0,
        )
        .unwrap();
        let mut logger = CollectingLogger::default();
        let settings = Settings { debug_warnings: true, ..Settings::default() };
        simplify_templates(&mut stream, &mut logger, &settings);
        assert!(logger.contains("simplifyTemplates: bailing out"));
    }

    #[test]
    fn test_idempotent() {
        let code = "template < class T > T f ( T x ) { return x ; } int a = f < int > ( 3 ) ;";
        let mut stream = tokenize(code, 0).unwrap();
        let mut logger = CollectingLogger::default();
        simplify_templates(&mut stream, &mut logger, &Settings::default());
        let once = stream.render();
        simplify_templates(&mut stream, &mut logger, &Settings::default());
        assert_eq!(stream.render(), once);
    }

    #[test]
    fn test_typename_outside_heads_is_dropped() {
        assert_eq!(
            simplify("template < typename T > T f ( T x ) { return x ; } int a = f < int > ( 3 ) ; typename int b ;"),
            "int a = f<int> ( 3 ) ; int b ; int f<int> ( int x ) { return x ; }"
        );
    }

    #[test]
    fn test_untouched_without_instantiations() {
        let code = "template < class T > struct A { T x ; } ;";
        assert_eq!(simplify(code), code);
    }
}
