// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use ceval_engine::{
    apint::ApInt,
    backend::{
        memory::{MemoryFrame, MemoryTarget},
        BasicType, FrameRef,
    },
    construct::create_value_from_ap_int,
    evaluate_expression, evaluate_expression_in_value, evaluate_expression_with_options,
    ContextVariable, ErrorKind, Options, Type, Value,
};
use tracing::info;

/// A small debuggee:
///
/// ```c++
/// struct Point { int x; int y; };
/// enum class Color : unsigned char {};
/// struct Widget { int count; Point origin; };
/// int g = 100;
///
/// void Widget::method() {
///     int x = 5;
///     int arr[3] = {1, 2, 3};
///     Point p = {1, 2};
///     Point *pp = &p;
///     unsigned char c = 200;
///     double d = 2.5;
///     std::unique_ptr<int> up;      // -> 7
///     std::unique_ptr<Point> sp;    // -> {30, 40}
///     int &rx = x;
///     void *raw = &x;
///     Point *null = nullptr;
/// }
/// ```
struct Fixture {
    target: MemoryTarget,
    frame: MemoryFrame,
}

impl Fixture {
    fn new() -> Self {
        let target = MemoryTarget::new();
        let int = target.ty(BasicType::Int);
        let uchar = target.ty(BasicType::UnsignedChar);
        let double = target.ty(BasicType::Double);
        let point = target.define_struct("Point", &[("x", &int), ("y", &int)]);
        let point_ptr = target.pointer_to(&point);
        target.define_enum("Color", Some(&uchar), true);
        let widget = target.define_struct("Widget", &[("count", &int), ("origin", &point)]);

        target.add_global("g", &int, &100i32.to_le_bytes());

        let frame = target.frame("Widget::method");
        let x = target.variable("x", &int, &5i32.to_le_bytes());
        frame.add_local("x", x.clone());
        frame.add_local("arr", target.variable("arr", &target.array_of(&int, 3), &words(&[1, 2, 3])));

        let p = target.variable("p", &point, &words(&[1, 2]));
        let p_address = p.load_address().unwrap();
        frame.add_local("p", p);
        frame.add_local("pp", target.variable("pp", &point_ptr, &p_address.to_le_bytes()));
        frame.add_local("c", target.variable("c", &uchar, &[200]));
        frame.add_local("d", target.variable("d", &double, &2.5f64.to_le_bytes()));

        let seven = target.alloc(&int, &7i32.to_le_bytes());
        let up_ty = target.define_smart_ptr("std::unique_ptr", &int);
        frame.add_local("up", target.variable("up", &up_ty, &seven.to_le_bytes()));
        let pointee = target.alloc(&point, &words(&[30, 40]));
        let sp_ty = target.define_smart_ptr("std::unique_ptr", &point);
        frame.add_local("sp", target.variable("sp", &sp_ty, &pointee.to_le_bytes()));

        let x_address = x.load_address().unwrap();
        frame.add_local("rx", target.variable("rx", &target.reference_to(&int), &x_address.to_le_bytes()));
        let void_ptr = target.pointer_to(&target.ty(BasicType::Void));
        frame.add_local("raw", target.variable("raw", &void_ptr, &x_address.to_le_bytes()));
        frame.add_local("null", target.variable("null", &point_ptr, &[0; 8]));

        let this_object = target.alloc(&widget, &words(&[9, 11, 12]));
        let widget_ptr = target.pointer_to(&widget);
        frame.add_local("this", target.variable("this", &widget_ptr, &this_object.to_le_bytes()));

        Self { target, frame }
    }

    fn frame(&self) -> FrameRef {
        self.frame.as_frame()
    }

    fn eval(&self, expr: &str) -> ceval_engine::Result<Value> {
        evaluate_expression(&self.frame(), expr)
    }

    fn eval_mut(&self, expr: &str) -> ceval_engine::Result<Value> {
        evaluate_expression_with_options(&self.frame(), expr, &Options::new().with_side_effects(true))
    }

    fn int(&self, expr: &str) -> i64 {
        self.eval(expr).unwrap_or_else(|err| panic!("{expr}: {err}")).get_i64().unwrap()
    }

    fn ty(&self, basic: BasicType) -> Type {
        self.target.ty(basic)
    }
}

fn words(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

#[test]
fn test_context_variable_arithmetic() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();
    let target = fixture.target.as_target();
    let forty_two =
        create_value_from_ap_int(&target, &ApInt::new(32, 42), &fixture.ty(BasicType::Int)).unwrap();
    let vars = [ContextVariable::new("x", forty_two)];
    let options = Options::new().with_context_vars(&vars);

    let result = evaluate_expression_with_options(&fixture.frame(), "x + 1", &options).unwrap();
    assert_eq!(result.ty().basic_type(), BasicType::Int);
    assert_eq!(result.get_i64().unwrap(), 43);

    // Without the context variable the local is visible again
    assert_eq!(fixture.int("x + 1"), 6);
}

#[test]
fn test_context_variables_last_binding_wins() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();
    let target = fixture.target.as_target();
    let int = fixture.ty(BasicType::Int);
    let vars = [
        ContextVariable::new("$v", create_value_from_ap_int(&target, &ApInt::new(32, 1), &int).unwrap()),
        ContextVariable::new("$v", create_value_from_ap_int(&target, &ApInt::new(32, 2), &int).unwrap()),
    ];
    let options = Options::new().with_context_vars(&vars);
    let result = evaluate_expression_with_options(&fixture.frame(), "$v * 10", &options).unwrap();
    assert_eq!(result.get_i64().unwrap(), 20);
}

#[test]
fn test_side_effects_rejected_without_writing() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    for expr in ["x = 7", "x += 1", "x++", "--x", "p.y = x", "rx = 0", "(x = 1) + 1"] {
        let err = fixture.eval(expr).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SideEffectNotPermitted, "{expr}");
    }
    assert_eq!(fixture.int("x"), 5);
    assert_eq!(fixture.int("p.y"), 2);
}

#[test]
fn test_side_effects_when_allowed() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    assert_eq!(fixture.eval_mut("x = 7").unwrap().get_i64().unwrap(), 7);
    assert_eq!(fixture.eval_mut("x++").unwrap().get_i64().unwrap(), 7);
    assert_eq!(fixture.int("x"), 8);
    assert_eq!(fixture.eval_mut("--x").unwrap().get_i64().unwrap(), 7);
    assert_eq!(fixture.eval_mut("p.y += 10").unwrap().get_i64().unwrap(), 12);
    assert_eq!(fixture.eval_mut("rx <<= 2").unwrap().get_i64().unwrap(), 28);
    assert_eq!(fixture.int("x"), 28);
    assert_eq!(fixture.eval_mut("d = 1").unwrap().get_float().unwrap().to_f64(), 1.0);
    assert_eq!(fixture.eval_mut("pp = 0").unwrap().get_u64().unwrap(), 0);

    let err = fixture.eval_mut("1 = 2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    let err = fixture.eval_mut("x = p").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_member_index_and_pointer_arithmetic() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    assert_eq!(fixture.int("p.x + pp->y"), 3);
    assert_eq!(fixture.int("(*pp).y"), 2);
    assert_eq!(fixture.int("arr[2]"), 3);
    assert_eq!(fixture.int("2[arr]"), 3);
    assert_eq!(fixture.int("*(arr + 1)"), 2);
    assert_eq!(fixture.int("*(1 + arr)"), 2);

    let difference = fixture.eval("&arr[2] - &arr[0]").unwrap();
    assert_eq!(difference.ty().basic_type(), BasicType::Long);
    assert_eq!(difference.get_i64().unwrap(), 2);

    assert_eq!(fixture.eval("p->x").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(fixture.eval("pp.x").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(fixture.eval("p.z").unwrap_err().kind(), ErrorKind::UndeclaredIdentifier);
}

#[test]
fn test_address_of_then_dereference() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();
    let original = fixture.eval("p.y").unwrap();
    let round_trip = fixture.eval("*&p.y").unwrap();
    assert_eq!(round_trip.ty(), original.ty());
    assert_eq!(round_trip.data().unwrap(), original.data().unwrap());
    assert_eq!(round_trip.load_address(), original.load_address());
}

#[test]
fn test_references_and_void_pointers() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let rx = fixture.eval("rx").unwrap();
    assert_eq!(rx.ty().basic_type(), BasicType::Int);
    assert_eq!(rx.get_i64().unwrap(), 5);

    assert_eq!(fixture.eval("*raw").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(fixture.int("*(int *)raw"), 5);
    assert_eq!(fixture.int("*static_cast<int *>(raw)"), 5);
    assert_eq!(fixture.eval("null->x").unwrap_err().kind(), ErrorKind::InvalidOperation);
    assert!(fixture.eval("null == nullptr").unwrap().get_bool().unwrap());
    assert!(fixture.eval("!null").unwrap().get_bool().unwrap());
    assert!(fixture.eval("pp != 0").unwrap().get_bool().unwrap());
}

#[test]
fn test_smart_pointers() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let pointee = fixture.eval("*up").unwrap();
    assert_eq!(pointee.ty().basic_type(), BasicType::Int);
    assert_eq!(pointee.get_i64().unwrap(), 7);
    assert_eq!(fixture.int("sp->y - sp->x"), 10);
    assert_eq!(fixture.int("(*sp).x"), 30);

    // The raw member stays reachable as an ordinary field
    assert_eq!(fixture.int("*up.__ptr_"), 7);
}

#[test]
fn test_identifier_lookup_order() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    assert_eq!(fixture.int("count"), 9);
    assert_eq!(fixture.int("origin.y"), 12);
    assert_eq!(fixture.int("this->count + g"), 109);
    assert_eq!(fixture.int("::g"), 100);
    assert_eq!(fixture.eval("missing").unwrap_err().kind(), ErrorKind::UndeclaredIdentifier);
}

#[test]
fn test_value_scope() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let p = fixture.eval("p").unwrap();
    let result = evaluate_expression_in_value(&p, "x * 10 + y").unwrap();
    assert_eq!(result.get_i64().unwrap(), 12);

    let pp = fixture.eval("pp").unwrap();
    assert_eq!(evaluate_expression_in_value(&pp, "y").unwrap().get_i64().unwrap(), 2);
    assert_eq!(evaluate_expression_in_value(&pp, "this->x").unwrap().get_i64().unwrap(), 1);

    // Frame locals are not visible from a value scope
    let err = evaluate_expression_in_value(&p, "arr[0]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UndeclaredIdentifier);
}

#[test]
fn test_invalid_scopes() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let err = evaluate_expression_in_value(&Value::invalid(), "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidScope);

    fixture.frame.invalidate();
    assert_eq!(fixture.eval("1").unwrap_err().kind(), ErrorKind::InvalidScope);
}

#[test]
fn test_enum_casts() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let color = fixture.eval("(Color)c").unwrap();
    assert!(color.ty().is_scoped_enum());
    assert_eq!(color.get_integer().unwrap().to_u128(), 200);
    assert_eq!(fixture.int("static_cast<int>(static_cast<Color>(c))"), 200);

    assert_eq!(fixture.eval("(Color)255.0").unwrap().get_integer().unwrap().to_u128(), 255);
    assert_eq!(fixture.eval("(Color)256.0").unwrap_err().kind(), ErrorKind::OutOfRange);

    // Scoped enums do not take part in arithmetic
    assert_eq!(fixture.eval("(Color)c + 1").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert!(fixture.eval("(Color)c == (Color)200").unwrap().get_bool().unwrap());
}

#[test]
fn test_scalar_casts_and_conversions() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    assert_eq!(fixture.int("(signed char)127.0"), 127);
    assert_eq!(fixture.int("(signed char)-128.0"), -128);
    assert_eq!(fixture.eval("(signed char)128.0").unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(fixture.int("(short)0x12345678"), 0x5678);
    assert_eq!(fixture.int("int(2.9)"), 2);
    assert_eq!(fixture.eval("(unsigned)-1").unwrap().get_u64().unwrap(), 0xffff_ffff);
    assert!(fixture.eval("(bool)0.5").unwrap().get_bool().unwrap());

    let sum = fixture.eval("c + d").unwrap();
    assert_eq!(sum.ty().basic_type(), BasicType::Double);
    assert_eq!(sum.get_float().unwrap().to_f64(), 202.5);

    let promoted = fixture.eval("c + c").unwrap();
    assert_eq!(promoted.ty().basic_type(), BasicType::Int);
    assert_eq!(promoted.get_i64().unwrap(), 400);

    assert_eq!(fixture.eval("(float)d").unwrap().ty().basic_type(), BasicType::Float);
    assert_eq!(fixture.eval("reinterpret_cast<char>(pp)").unwrap_err().kind(), ErrorKind::UnsupportedConversion);
    assert_eq!(fixture.eval("static_cast<long>(pp)").unwrap_err().kind(), ErrorKind::UnsupportedConversion);
    assert_eq!(fixture.eval("(int *)1.5").unwrap_err().kind(), ErrorKind::UnsupportedConversion);
    let address = fixture.eval("reinterpret_cast<unsigned long>(pp)").unwrap().get_u64().unwrap();
    assert_eq!(Some(address), fixture.eval("p").unwrap().load_address());
}

#[test]
fn test_logical_and_conditional() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    // The right operand is never evaluated, so its side effect is never attempted
    assert!(!fixture.eval("0 && (x = 1)").unwrap().get_bool().unwrap());
    assert!(fixture.eval("1 || (x = 1)").unwrap().get_bool().unwrap());
    assert_eq!(fixture.eval("1 && (x = 1)").unwrap_err().kind(), ErrorKind::SideEffectNotPermitted);

    let mixed = fixture.eval("x > 3 ? 1 : 2.5").unwrap();
    assert_eq!(mixed.ty().basic_type(), BasicType::Double);
    assert_eq!(mixed.get_float().unwrap().to_f64(), 1.0);

    let same = fixture.eval("x > 3 ? x : 0").unwrap();
    assert_eq!(same.get_i64().unwrap(), 5);
    assert_eq!(fixture.int("x < 3 ? 10 : x == 5 ? 20 : 30"), 20);
    assert_eq!(fixture.eval("p ? 1 : 2").unwrap_err().kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_sizeof() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let size = fixture.eval("sizeof(Point)").unwrap();
    assert_eq!(size.ty().basic_type(), BasicType::UnsignedLong);
    assert_eq!(size.get_u64().unwrap(), 8);
    assert_eq!(fixture.int("sizeof x"), 4);
    assert_eq!(fixture.int("sizeof(arr)"), 12);
    assert_eq!(fixture.int("sizeof(Point *)"), 8);
    assert_eq!(fixture.int("sizeof(long double)"), 16);
    assert_eq!(fixture.eval("sizeof(void)").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(fixture.eval("sizeof(x++)").unwrap_err().kind(), ErrorKind::SideEffectNotPermitted);
}

#[test]
fn test_parse_errors_report_position() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    let err = fixture.eval("x + * ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    let err = fixture.eval("x $$ 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert!(err.message().contains("position 2"), "{}", err.message());
}

#[test]
fn test_member_access_near_address_space_end() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    for expr in [
        "((Point*)0xfffffffffffffffc)->y",
        "((Point*)0xfffffffffffffffc)[1].x",
        "(*(Point*)0xffffffffffffffff).y",
    ] {
        let outcome = fixture.eval(expr).and_then(|value| value.get_i64());
        let err = outcome.expect_err(expr);
        assert_eq!(err.kind(), ErrorKind::BackendFailure, "{expr}: {err}");
    }
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    ceval_common::logging::ensure_test_logging(None);
    info!("Running test");
    let fixture = Fixture::new();

    assert_eq!(fixture.int("((((((((x))))))))"), 5);
    let deep = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
    let err = fixture.eval(&deep).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
    let err = fixture.eval(&format!("{}x", "!".repeat(50_000))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseError);
}
