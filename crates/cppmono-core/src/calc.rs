//! Constant folding.
//!
//! Two tiers: [`simplify_numeric_calculations`] folds windows of two numeric
//! literals around one operator when the neighboring operators bind no
//! tighter, and [`simplify_calculations`] walks the whole stream applying
//! structural rewrites (redundant parentheses, short-circuit constants,
//! arithmetic identities) and delegating the rest to the numeric tier.
//!
//! Folds never fire on division or modulo by a literal zero, and a division
//! only folds when it is exact. A left shift is suppressed when the token
//! before the window is `<<` so stream insertion is never misread.

use crate::math::{self, MathError};
use crate::stream::TokenStream;
use crate::token::TokenId;

// The precedence ladder: each step accepts everything the previous one did.
fn is_lower_than_or(stream: &TokenStream, tok: TokenId) -> bool {
    let t = stream.token(tok);
    t.is_assignment_op()
        || matches!(
            t.text(),
            "}" | ";" | "(" | "[" | "]" | ")" | "," | "?" | ":" | "||" | "&&"
                | "return" | "throw" | "case"
        )
}

fn is_lower_than_xor(stream: &TokenStream, tok: TokenId) -> bool {
    is_lower_than_or(stream, tok) || stream.text(tok) == "|"
}

fn is_lower_than_and(stream: &TokenStream, tok: TokenId) -> bool {
    is_lower_than_xor(stream, tok) || stream.text(tok) == "^"
}

fn is_lower_than_shift(stream: &TokenStream, tok: TokenId) -> bool {
    is_lower_than_and(stream, tok)
        || stream.token(tok).is_comparison_op()
        || stream.text(tok) == "&"
}

fn is_lower_than_plus_minus(stream: &TokenStream, tok: TokenId) -> bool {
    is_lower_than_shift(stream, tok) || matches!(stream.text(tok), "<<" | ">>")
}

fn is_lower_than_mul_div(stream: &TokenStream, tok: TokenId) -> bool {
    is_lower_than_plus_minus(stream, tok) || matches!(stream.text(tok), "+" | "-")
}

fn is_lower_eq_than_mul_div(stream: &TokenStream, tok: TokenId) -> bool {
    is_lower_than_mul_div(stream, tok) || matches!(stream.text(tok), "*" | "/" | "%")
}

/// Fold `prev N1 op N2 after` windows starting right after `anchor` for as
/// long as the precedence gates allow. Returns whether anything changed.
pub fn simplify_numeric_calculations(
    stream: &mut TokenStream,
    anchor: TokenId,
) -> Result<bool, MathError> {
    let mut ret = false;
    let mut tok = anchor;

    loop {
        if stream.at(tok, 4).is_none() {
            break;
        }
        let n1 = stream.next(tok).unwrap();
        let n2 = stream.at(tok, 3).unwrap();
        if !stream.token(n1).is_number() || !stream.token(n2).is_number() {
            break;
        }
        let op = stream.at(tok, 2).unwrap();
        let after = stream.at(tok, 4).unwrap();
        let op_text = stream.text(op).to_string();

        let whole_division = stream.text(tok) == "*"
            && op_text == "/"
            && stream.text(n2) != "0"
            && math::divides_exactly(n1, stream.text(n1), stream.text(n2));

        if !whole_division {
            let assoc_ok = match op_text.as_str() {
                "*" => {
                    (is_lower_than_mul_div(stream, tok) || stream.text(tok) == "*")
                        && is_lower_eq_than_mul_div(stream, after)
                }
                "/" | "%" => {
                    is_lower_than_mul_div(stream, tok)
                        && is_lower_eq_than_mul_div(stream, after)
                }
                "+" | "-" => {
                    is_lower_than_mul_div(stream, tok)
                        && is_lower_than_mul_div(stream, after)
                }
                ">>" | "<<" => {
                    is_lower_than_shift(stream, tok)
                        && is_lower_than_plus_minus(stream, after)
                }
                "&" => {
                    is_lower_than_shift(stream, tok) && is_lower_than_shift(stream, after)
                }
                "^" => {
                    is_lower_than_and(stream, tok) && is_lower_than_and(stream, after)
                }
                "|" => {
                    is_lower_than_xor(stream, tok) && is_lower_than_xor(stream, after)
                }
                _ => false,
            };
            if !assoc_ok {
                break;
            }
        }

        let prev = tok;
        // never fold division or modulo by a literal zero
        if matches!(op_text.as_str(), "/" | "%") && stream.text(n2) == "0" {
            tok = n1;
            continue;
        }

        let a = stream.text(n1).to_string();
        let b = stream.text(n2).to_string();

        // bitwise and shift operations work on the integer values
        if matches!(op_text.as_str(), ">>" | "<<" | "&" | "^" | "|") {
            let result = match op_text.as_str() {
                "&" | "|" | "^" => {
                    Some(math::calculate(n1, &a, &b, op_text.chars().next().unwrap())?)
                }
                "<<" => {
                    let rhs = math::to_long_number(&b);
                    if stream.text(prev) != "<<" && rhs > 0 {
                        let lhs = math::to_long_number(&a);
                        let shifted = if rhs >= 64 { 0 } else { lhs.wrapping_shl(rhs as u32) };
                        Some(shifted.to_string())
                    } else {
                        None
                    }
                }
                _ => {
                    let rhs = math::to_long_number(&b);
                    if rhs > 0 {
                        Some((math::to_long_number(&a) >> rhs.min(63)).to_string())
                    } else {
                        None
                    }
                }
            };
            if let Some(result) = result {
                stream.set_text(n1, result);
            }
            // shift by zero keeps the left operand as the whole result
            stream.delete_next(n1, 2);
            ret = true;
            tok = n1;
            continue;
        }

        // a leading unary minus folds the sum the other way around
        if stream.text(prev) == "-" && op_text == "-" {
            let sum = math::add(n1, &a, &b)?;
            stream.set_text(n1, sum);
        } else if stream.text(prev) == "-" && op_text == "+" {
            let diff = math::subtract(n1, &a, &b)?;
            stream.set_text(n1, diff);
        } else {
            let result = math::calculate(n1, &a, &b, op_text.chars().next().unwrap())?;
            stream.set_text(n1, result);
        }
        stream.delete_next(n1, 2);
        ret = true;
        tok = n1;
    }
    Ok(ret)
}

fn is_name_at(stream: &TokenStream, id: Option<TokenId>) -> bool {
    id.is_some_and(|t| stream.token(t).is_name())
}

fn is_number_at(stream: &TokenStream, id: Option<TokenId>) -> bool {
    id.is_some_and(|t| stream.token(t).is_number())
}

fn is_const_op_at(stream: &TokenStream, id: Option<TokenId>) -> bool {
    id.is_some_and(|t| stream.token(t).is_const_op())
}

fn is_any_op_at(stream: &TokenStream, id: Option<TokenId>) -> bool {
    id.is_some_and(|t| {
        let t = stream.token(t);
        t.is_const_op() || t.is_assignment_op()
    })
}

fn text_in(stream: &TokenStream, id: Option<TokenId>, set: &[&str]) -> bool {
    id.is_some_and(|t| set.contains(&stream.text(t)))
}

/// One pass of structural simplification over the whole stream. Callers that
/// need a fixed point re-run while this returns true.
pub fn simplify_calculations(stream: &mut TokenStream) -> Result<bool, MathError> {
    let mut ret = false;
    let mut cur = stream.front();

    while let Some(mut tok) = cur {
        // remove redundant parentheses around a lone identifier where the
        // grammar cannot need them (casts, operator declarations and
        // function-pointer types keep theirs)
        let paren_var = {
            let inner_ok = stream.text_is(tok, 1, "(")
                && is_name_at(stream, stream.at(tok, 2))
                && stream.text_is(tok, 3, ")");
            let follow_simple = text_in(stream, stream.at(tok, 4), &[";", ")", ",", "]"]);
            let follow_cop = is_const_op_at(stream, stream.at(tok, 4))
                && (stream.at(tok, 2).is_some_and(|v| stream.token(v).var_id > 0)
                    || !text_in(stream, stream.at(tok, 4), &["*", "&", "+", "-"]));
            inner_ok && (follow_simple || follow_cop)
        };
        if paren_var
            && !stream.token(tok).is_name()
            && stream.text(tok) != ">"
            && stream.text(tok) != "]"
            && stream.text_at(tok, -1) != Some("operator")
            && !(stream.text_at(tok, -1) == Some("*") && stream.text(tok) == ")")
            && !(stream.text_at(tok, -1) == Some(")") && stream.text(tok) == ")")
            && !(stream.text_at(tok, -2) == Some("*")
                && is_name_at(stream, stream.at(tok, -1))
                && stream.text(tok) == ")")
            && !(is_name_at(stream, stream.at(tok, -2))
                && stream.text_at(tok, -1) == Some("(")
                && stream.text(tok) == ")"
                && stream.text_is(tok, 1, "(")
                && is_name_at(stream, stream.at(tok, 2)))
            && !(stream.text(tok) == ")"
                && stream.text_is(tok, 1, "(")
                && is_name_at(stream, stream.at(tok, 2))
                && stream.text_is(tok, 3, ")")
                && stream.text_is(tok, 4, ";"))
        {
            stream.delete_next(tok, 1);
            tok = stream.next(tok).unwrap();
            stream.delete_next(tok, 1);
            ret = true;
        }

        // 'x' == 97 between short-circuit contexts becomes 120 == 97
        if stream.token(tok).is_char_lit()
            && text_in(stream, stream.prev(tok), &["(", "&&", "||"])
            && stream.at(tok, 1).is_some_and(|t| stream.token(t).is_comparison_op())
            && is_number_at(stream, stream.at(tok, 2))
            && text_in(stream, stream.at(tok, 3), &["&&", "||", ")"])
        {
            let value = stream.text(tok).as_bytes().get(1).copied().unwrap_or(0);
            stream.set_text(tok, (value as i64 & 0xff).to_string());
        }

        if stream.token(tok).is_number() {
            let prev = stream.prev(tok);

            // 0 && X / 1 || X: delete X up to the enclosing , ; ) ?
            if text_in(stream, prev, &["(", "=", ","])
                && ((stream.text(tok) == "0" && stream.text_is(tok, 1, "&&"))
                    || (stream.text(tok) == "1" && stream.text_is(tok, 1, "||")))
            {
                let mut par = 0usize;
                let mut tok2 = Some(tok);
                while let Some(t) = tok2 {
                    match stream.text(t) {
                        "(" => par += 1,
                        ")" => {
                            if par == 0 {
                                break;
                            }
                            par -= 1;
                        }
                        "," | ";" | "?" if par == 0 => break,
                        _ => {}
                    }
                    tok2 = stream.next(t);
                }
                if let Some(end) = tok2 {
                    if matches!(stream.text(end), ")" | ";" | "," | "?") {
                        stream.erase_range(tok, Some(end));
                        ret = true;
                    }
                }
                cur = stream.next(tok);
                continue;
            }

            if stream.text(tok) == "0" {
                // x + 0, x - 0, x | 0
                if text_in(stream, prev, &["+", "-", "|"]) {
                    let op = prev.unwrap();
                    // whole dead assignment: ; x = x + 0 ;
                    let dead = text_in(stream, stream.at(op, -4), &[";", "{", "}"])
                        && is_name_at(stream, stream.at(op, -3))
                        && stream.text_at(op, -2) == Some("=")
                        && is_name_at(stream, stream.at(op, -1))
                        && stream.text_is(tok, 1, ";")
                        && stream.text_at(op, -3) == stream.text_at(op, -1);
                    if dead {
                        let lhs = stream.at(op, -3).unwrap();
                        stream.delete_next(lhs, 2);
                        stream.delete_token(lhs);
                    }
                    stream.delete_next(op, 1);
                    let after = stream.delete_token(op);
                    ret = true;
                    cur = after.and_then(|t| stream.next(t));
                    continue;
                }
                // 0 + x, 0 | x
                if (text_in(stream, prev, &["=", "(", "[", ","])
                    || text_in(stream, prev, &["return", "case"]))
                    && text_in(stream, stream.next(tok), &["+", "|"])
                {
                    stream.delete_next(tok, 1);
                    let after = stream.delete_token(tok);
                    ret = true;
                    cur = after.and_then(|t| stream.next(t));
                    continue;
                }
                // 0 * X and 0 && X with dereferenced operands
                let zero_mul = {
                    let assign_ctx = text_in(stream, prev, &["=", "[", "(", ","]);
                    let flow_ctx = text_in(stream, prev, &["return", "case"]);
                    let op1 = stream.next(tok);
                    let operand = stream.at(tok, 2);
                    let term = stream.at(tok, 3);
                    let star = stream.text_at(tok, 1) == Some("*");
                    let star_or_and = star || stream.text_at(tok, 1) == Some("&&");
                    let paren = stream.text_at(tok, 2) == Some("(");
                    let simple_term = |allowed_eq: bool| {
                        text_in(stream, term, &[",", "]", ")", ";"])
                            || (allowed_eq && stream.text_at(tok, 3) == Some("="))
                            || is_const_op_at(stream, term)
                            || (flow_ctx && stream.text_at(tok, 3) == Some(":"))
                    };
                    let num_term = text_in(stream, term, &[",", "]", ")", ";", ":"])
                        || is_any_op_at(stream, term);
                    op1.is_some()
                        && ((assign_ctx && star) || (flow_ctx && star_or_and))
                        && (paren
                            || (is_name_at(stream, operand) && simple_term(true))
                            || (is_number_at(stream, operand) && num_term))
                };
                if zero_mul {
                    stream.delete_next(tok, 1);
                    if stream.text_is(tok, 1, "(") {
                        let open = stream.next(tok).unwrap();
                        if let Some(close) = stream.link(open) {
                            stream.erase_range(tok, Some(close));
                        }
                    }
                    stream.delete_next(tok, 1);
                    ret = true;
                    cur = stream.next(tok);
                    continue;
                }
                // 0 && * p  /  0 && & p
                let zero_and_deref = (text_in(stream, prev, &["=", "[", "(", ","])
                    || text_in(stream, prev, &["return", "case"]))
                    && stream.text_is(tok, 1, "&&")
                    && text_in(stream, stream.at(tok, 2), &["*", "&"])
                    && stream.at(tok, 3).is_some()
                    && (text_in(stream, stream.at(tok, 4), &[",", "]", ")", ";", "=", ":"])
                        || is_const_op_at(stream, stream.at(tok, 4)));
                if zero_and_deref {
                    stream.delete_next(tok, 2);
                    if stream.text_is(tok, 1, "(") {
                        let open = stream.next(tok).unwrap();
                        if let Some(close) = stream.link(open) {
                            stream.erase_range(tok, Some(close));
                        }
                    }
                    stream.delete_next(tok, 1);
                    ret = true;
                    cur = stream.next(tok);
                    continue;
                }
            }

            if stream.text(tok) == "1" {
                // 1 || X
                let one_or = (text_in(stream, prev, &["=", "[", "(", ","])
                    || text_in(stream, prev, &["return", "case"]))
                    && stream.text_is(tok, 1, "||")
                    && stream.at(tok, 2).is_some()
                    && (stream.text_at(tok, 2) == Some("(")
                        || text_in(stream, stream.at(tok, 3), &[",", "]", ")", ";", "=", ":"])
                        || is_const_op_at(stream, stream.at(tok, 3)));
                if one_or {
                    stream.delete_next(tok, 1);
                    if stream.text_is(tok, 1, "(") {
                        let open = stream.next(tok).unwrap();
                        if let Some(close) = stream.link(open) {
                            stream.erase_range(tok, Some(close));
                        }
                    }
                    stream.delete_next(tok, 1);
                    ret = true;
                    cur = stream.next(tok);
                    continue;
                }
                // 1 || * p
                let one_or_deref = (text_in(stream, prev, &["=", "[", "(", ","])
                    || text_in(stream, prev, &["return", "case"]))
                    && stream.text_is(tok, 1, "||")
                    && text_in(stream, stream.at(tok, 2), &["*", "&"])
                    && stream.at(tok, 3).is_some()
                    && (text_in(stream, stream.at(tok, 4), &[",", "]", ")", ";", "=", ":"])
                        || is_const_op_at(stream, stream.at(tok, 4)));
                if one_or_deref {
                    stream.delete_next(tok, 2);
                    if stream.text_is(tok, 1, "(") {
                        let open = stream.next(tok).unwrap();
                        if let Some(close) = stream.link(open) {
                            stream.erase_range(tok, Some(close));
                        }
                    }
                    stream.delete_next(tok, 1);
                    ret = true;
                    cur = stream.next(tok);
                    continue;
                }
            }

            // x * 1 and 1 * x
            if (stream.text_at(tok, -1) == Some("*") && stream.text(tok) == "1")
                || (stream.text(tok) == "1" && stream.text_is(tok, 1, "*"))
            {
                let anchor = match stream.prev(tok) {
                    Some(p) if stream.token(p).is_const_op() => p,
                    _ => tok,
                };
                stream.delete_next(anchor, 1);
                let after = stream.delete_token(anchor);
                ret = true;
                cur = after.and_then(|t| stream.next(t));
                continue;
            }

            // parentheses around a lone number
            if stream.at(tok, -2).is_some()
                && !is_name_at(stream, stream.at(tok, -2))
                && stream.text_at(tok, -2) != Some(">")
                && stream.text_at(tok, -1) == Some("(")
                && stream.text_is(tok, 1, ")")
            {
                let open = stream.prev(tok).unwrap();
                let num = stream.delete_token(open).unwrap();
                stream.delete_next(num, 1);
                ret = true;
                cur = stream.next(num);
                continue;
            }

            // neutral constants inside logical groups: (0 || .. | 0) (1 && ..)
            let neutral = (stream.text_at(tok, -1) == Some("(")
                && text_in(stream, stream.next(tok), &["||", "|"])
                && matches!(stream.text(tok), "0"))
                || (text_in(stream, prev, &["||", "|"])
                    && stream.text(tok) == "0"
                    && stream.text_is(tok, 1, ")"))
                || (stream.text_at(tok, -1) == Some("(")
                    && stream.text(tok) == "1"
                    && stream.text_is(tok, 1, "&&"))
                || (stream.text_at(tok, -1) == Some("&&")
                    && stream.text(tok) == "1"
                    && stream.text_is(tok, 1, ")"));
            if neutral {
                let anchor = match stream.prev(tok) {
                    Some(p) if stream.token(p).is_const_op() => p,
                    _ => tok,
                };
                stream.delete_next(anchor, 1);
                let after = stream.delete_token(anchor);
                ret = true;
                cur = after.and_then(|t| stream.next(t));
                continue;
            }

            // literal comparisons inside logical contexts
            if stream.at(tok, 1).is_some_and(|t| stream.token(t).is_comparison_op())
                && is_number_at(stream, stream.at(tok, 2))
                && math::is_int(stream.text(tok))
                && stream.at(tok, 2).is_some_and(|t| math::is_int(stream.text(t)))
                && text_in(stream, prev, &["(", "&&", "||"])
                && text_in(stream, stream.at(tok, 3), &[")", "&&", "||", "?"])
            {
                let lhs = math::to_long_number(stream.text(tok));
                let rhs = math::to_long_number(stream.text_at(tok, 2).unwrap());
                let result = match stream.text_at(tok, 1).unwrap() {
                    "==" => lhs == rhs,
                    "!=" => lhs != rhs,
                    "<=" => lhs <= rhs,
                    ">=" => lhs >= rhs,
                    "<" => lhs < rhs,
                    _ => lhs > rhs,
                };
                stream.set_text(tok, if result { "1" } else { "0" });
                stream.delete_next(tok, 2);
                ret = true;
                cur = stream.next(tok);
                continue;
            }
        } else {
            ret |= simplify_numeric_calculations(stream, tok)?;
        }

        cur = stream.next(tok);
    }
    Ok(ret)
}

/// Run [`simplify_calculations`] until nothing changes. Returns whether any
/// pass changed the stream.
pub fn fold_constants(stream: &mut TokenStream) -> Result<bool, MathError> {
    let mut changed = false;
    while simplify_calculations(stream)? {
        changed = true;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn folded(code: &str) -> String {
        let mut stream = tokenize(code, 0).unwrap();
        fold_constants(&mut stream).unwrap();
        stream.render()
    }

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(folded("x = 1 + 2 ;"), "x = 3 ;");
        assert_eq!(folded("x = 1 + 2 * 3 ;"), "x = 7 ;");
        assert_eq!(folded("x = 10 - 2 - 3 ;"), "x = 5 ;");
        assert_eq!(folded("x = 12 / 3 / 2 ;"), "x = 2 ;");
    }

    #[test]
    fn test_precedence_is_respected() {
        assert_eq!(folded("x = 2 + 3 * 4 + 5 ;"), "x = 19 ;");
        assert_eq!(folded("x = 1 | 2 & 3 ;"), "x = 3 ;");
        assert_eq!(folded("x = 8 >> 1 + 1 ;"), "x = 2 ;");
    }

    #[test]
    fn test_division_rules() {
        // division by zero is left alone
        assert_eq!(folded("x = 1 / 0 ;"), "x = 1 / 0 ;");
        assert_eq!(folded("x = 1 % 0 ;"), "x = 1 % 0 ;");
        // inexact division after a multiplication is not reassociated
        assert_eq!(folded("x = y * 7 / 2 ;"), "x = y * 7 / 2 ;");
        // exact division folds
        assert_eq!(folded("x = y * 8 / 2 ;"), "x = y * 4 ;");
    }

    #[test]
    fn test_shift_rules() {
        assert_eq!(folded("x = 1 << 4 ;"), "x = 16 ;");
        assert_eq!(folded("x = 16 >> 2 ;"), "x = 4 ;");
        // stream insertion is never folded
        assert_eq!(folded("cout << 1 << 2 ;"), "cout << 1 << 2 ;");
    }

    #[test]
    fn test_comparisons_yield_bool_literals() {
        assert_eq!(folded("if ( 1 == 1 ) { }"), "if ( 1 ) { }");
        assert_eq!(folded("if ( 2 < 1 ) { }"), "if ( 0 ) { }");
        // outside a logical context a comparison is left alone
        assert_eq!(folded("x = 1 < 2 ;"), "x = 1 < 2 ;");
    }

    #[test]
    fn test_short_circuit_constants() {
        assert_eq!(folded("if ( 0 && foo ( ) ) { }"), "if ( 0 ) { }");
        assert_eq!(folded("if ( 1 || foo ( ) ) { }"), "if ( 1 ) { }");
    }

    #[test]
    fn test_identities() {
        assert_eq!(folded("x = y + 0 ;"), "x = y ;");
        assert_eq!(folded("x = 0 + y ;"), "x = y ;");
        assert_eq!(folded("x = y * 1 ;"), "x = y ;");
        assert_eq!(folded("x = 1 * y ;"), "x = y ;");
        assert_eq!(folded("return 0 * y ;"), "return 0 ;");
    }

    #[test]
    fn test_redundant_parens() {
        assert_eq!(folded("x = ( y ) ;"), "x = y ;");
        assert_eq!(folded("x = ( 7 ) ;"), "x = 7 ;");
        // cast-like and template contexts keep their parentheses
        assert_eq!(folded("f < int > ( y ) ;"), "f < int > ( y ) ;");
    }

    #[test]
    fn test_char_comparison() {
        assert_eq!(folded("if ( 'a' == 97 ) { }"), "if ( 1 ) { }");
    }

    #[test]
    fn test_dead_assignment_removed() {
        assert_eq!(folded("; x = x + 0 ;"), "; ;");
    }

    #[test]
    fn test_template_args_fold() {
        assert_eq!(folded("A < 1 + 2 > a ;"), "A < 3 > a ;");
    }

    #[test]
    fn test_bracket_links_stay_consistent() {
        let mut stream = tokenize("if ( 0 && foo ( bar ( 1 ) ) ) { }", 0).unwrap();
        fold_constants(&mut stream).unwrap();
        assert_eq!(stream.render(), "if ( 0 ) { }");
        assert!(stream.check_links().is_none());
    }
}
