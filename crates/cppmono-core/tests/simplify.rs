//! End-to-end tests for the template simplification pipeline.

use cppmono_core::{
    find_unbalanced_angle_brackets, fold_constants, simplify_std_types, simplify_templates,
    tokenize, CollectingLogger, Settings, TokenStream,
};
use pretty_assertions::assert_eq;

fn prepare(code: &str) -> TokenStream {
    let mut stream = tokenize(code, 0).expect("tokenize");
    simplify_std_types(&mut stream);
    stream
}

fn simplify(code: &str) -> String {
    let mut stream = prepare(code);
    let mut logger = CollectingLogger::default();
    simplify_templates(&mut stream, &mut logger, &Settings::default());
    assert!(
        stream.check_links().is_none(),
        "bracket link invariant broken: {}",
        stream.render()
    );
    stream.render()
}

#[test]
fn function_template_is_monomorphized() {
    assert_eq!(
        simplify("template < class T > T f ( T x ) { return x ; } int a = f < int > ( 3 ) ;"),
        "int a = f<int> ( 3 ) ; int f<int> ( int x ) { return x ; }"
    );
}

#[test]
fn defaulted_parameter_is_materialized() {
    assert_eq!(
        simplify("template < class T , class U = int > struct P { } ; P < char > p ;"),
        "P<char,int> p ; struct P<char,int> { } ;"
    );
}

#[test]
fn non_type_argument_is_folded_before_mangling() {
    let out = simplify("template < int N > struct A { } ; A < 1 + 2 > a ;");
    assert_eq!(out, "A<3> a ; struct A<3> { } ;");
    assert!(!out.contains("1 + 2"));
}

#[test]
fn explicit_specialization_becomes_a_plain_function() {
    assert_eq!(
        simplify("template < > void g < int > ( ) { } g < int > ( ) ;"),
        "void g<int> ( ) { } g<int> ( ) ;"
    );
}

#[test]
fn self_referential_template_substitutes_its_inner_use() {
    assert_eq!(
        simplify("template < class T > struct S { S < T > * next ; } ; S < int > s ;"),
        "S<int> s ; struct S<int> { S<int> * next ; } ;"
    );
}

#[test]
fn short_circuit_constant_collapses() {
    let mut stream = prepare("if ( 0 && foo ( ) ) { } int x = 1 + 2 * 3 ;");
    fold_constants(&mut stream).expect("fold");
    assert_eq!(stream.render(), "if ( 0 ) { } int x = 7 ;");
}

#[test]
fn equal_instantiations_share_one_definition() {
    let out = simplify(
        "template < class T > struct A { T x ; } ; A < int > a ; A < int > b ;",
    );
    assert_eq!(out, "A<int> a ; A<int> b ; struct A<int> { int x ; } ;");
    assert_eq!(out.matches("struct A<int>").count(), 1);
}

#[test]
fn distinct_instantiations_get_distinct_definitions() {
    let out = simplify(
        "template < class T > struct A { T x ; } ; A < int > a ; A < unsigned int > b ;",
    );
    assert_eq!(
        out,
        "A<int> a ; A<unsignedint> b ; struct A<int> { int x ; } ; struct A<unsignedint> { int x ; } ;"
    );
}

#[test]
fn nested_template_argument_is_accepted() {
    let out = simplify(
        "template < class T > struct A { T x ; } ; A < B < int > > a ;",
    );
    // the outer instantiation uses the inner mangled-style name
    assert!(out.contains("A<B<int>>"), "unexpected output: {out}");
    assert!(out.starts_with("A<B<int>> a ;"), "unexpected output: {out}");
}

#[test]
fn member_function_outside_class_is_expanded() {
    let out = simplify(
        "template < class T > struct A { T f ( T x ) ; } ; \
         template < class T > T A < T > :: f ( T x ) { return x ; } \
         A < int > a ;",
    );
    assert!(
        out.contains("struct A<int> { int f ( int x ) ; } ;"),
        "class body not expanded: {out}"
    );
    assert!(
        out.contains("A<int> :: f ( int x ) { return x ; }"),
        "member definition not expanded: {out}"
    );
    assert!(out.contains("A<int> a ;"), "call site not rewritten: {out}");
}

#[test]
fn no_generic_survivors_after_expansion() {
    let out = simplify(
        "template < class T > T f ( T x ) { return x ; } int a = f < int > ( 3 ) ;",
    );
    assert!(!out.contains("template"), "generic survived: {out}");
}

#[test]
fn uninstantiated_declaration_is_kept() {
    let code = "template < class T > struct A { T x ; } ;";
    assert_eq!(simplify(code), code);
}

#[test]
fn driver_is_idempotent() {
    let code =
        "template < class T , class U = int > struct P { } ; P < char > p ; int q = 1 + 2 ;";
    let mut stream = prepare(code);
    let mut logger = CollectingLogger::default();
    simplify_templates(&mut stream, &mut logger, &Settings::default());
    let once = stream.render();
    simplify_templates(&mut stream, &mut logger, &Settings::default());
    assert_eq!(stream.render(), once);
}

#[test]
fn argument_count_mismatch_is_reported_and_skipped() {
    // the P site supplies one argument where two are declared
    let code = "template < class T , class U > struct P { } ; short P < char > p ;";
    let mut stream = prepare(code);
    let mut logger = CollectingLogger::default();
    let settings = Settings { debug_warnings: true, ..Settings::default() };
    simplify_templates(&mut stream, &mut logger, &settings);
    assert!(logger.contains("Failed to instantiate template"));
    assert!(stream.render().contains("P < char >"), "site must survive");
}

#[test]
fn syntax_probe_spots_the_offending_statement() {
    let stream = prepare("int ok ; ; A < int b ;");
    let tok = find_unbalanced_angle_brackets(&stream).expect("should flag");
    assert_eq!(stream.text(tok), "A");

    let stream = prepare("A < B < int > > x ; A < B < int >> y ;");
    assert!(find_unbalanced_angle_brackets(&stream).is_none());
}

#[test]
fn specialization_and_generic_coexist() {
    // the specialization is renamed first, so the generic never expands ints
    let out = simplify(
        "template < > int f < int > ( int x ) { return 0 ; } \
         template < class T > T f ( T x ) { return x ; } \
         int a = f < int > ( 3 ) ; char b = f < char > ( 'c' ) ;",
    );
    assert!(
        out.starts_with("int f<int> ( int x ) { return 0 ; }"),
        "specialization lost: {out}"
    );
    assert!(out.contains("char f<char> ( char x ) { return x ; }"), "{out}");
    assert!(out.contains("int a = f<int> ( 3 )"), "{out}");
    assert!(out.contains("char b = f<char> ( 'c' )"), "{out}");
    assert!(!out.contains("template"), "{out}");
}
