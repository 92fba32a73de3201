//! Stack machine executing compiled [`Template`] programs.

use serde_json::Value;
use tracing::trace;

use crate::bytecode::{Instruction, Template};
use crate::data::DataProvider;
use crate::engine::Engine;
use crate::error::{Error, RuntimeError};
use crate::escape::escape_html;
use crate::value;
use crate::MAX_OUTPUT_LEN;

/// Maximum nesting of `{% include %}`.
pub(crate) const MAX_INCLUDE_DEPTH: usize = 32;

pub(crate) struct Vm<'e> {
    engine: &'e Engine,
    data: &'e dyn DataProvider,
    /// Output buffers; the last one receives output. Captures push more.
    buffers: Vec<String>,
    depth: usize,
}

/// Execution state of one template invocation.
struct Frame<'t> {
    template: &'t Template,
    /// Index of the instruction being executed.
    at: usize,
    stack: Vec<Value>,
    /// `None` until assigned; lets `{% param %}` see supplied args.
    locals: Vec<Option<Value>>,
    loops: Vec<std::vec::IntoIter<(Value, Value)>>,
}

impl Frame<'_> {
    fn fail(&self, message: impl Into<String>) -> Error {
        Error::Runtime(RuntimeError {
            template: self.template.name.clone(),
            line: self.template.line_at(self.at),
            message: message.into(),
        })
    }

    fn pop(&mut self) -> Result<Value, Error> {
        self.stack
            .pop()
            .ok_or_else(|| self.fail("internal error: stack underflow"))
    }

    fn peek(&self) -> Result<&Value, Error> {
        self.stack
            .last()
            .ok_or_else(|| self.fail("internal error: stack underflow"))
    }

    /// Pop `n` values, returned in push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Error> {
        let Some(from) = self.stack.len().checked_sub(n) else {
            return Err(self.fail("internal error: stack underflow"));
        };
        Ok(self.stack.split_off(from))
    }

    fn store(&mut self, slot: u16, value: Value) -> Result<(), Error> {
        match self.locals.get_mut(usize::from(slot)) {
            Some(local) => {
                *local = Some(value);
                Ok(())
            }
            None => Err(self.fail(format!("internal error: bad local slot {slot}"))),
        }
    }

    fn load(&self, slot: u16) -> Value {
        self.locals
            .get(usize::from(slot))
            .cloned()
            .flatten()
            .unwrap_or(Value::Null)
    }
}

impl<'e> Vm<'e> {
    pub(crate) fn new(engine: &'e Engine, data: &'e dyn DataProvider) -> Self {
        Self {
            engine,
            data,
            buffers: vec![String::new()],
            depth: 0,
        }
    }

    /// Execute `template` from the top and return everything it printed.
    pub(crate) fn run(mut self, template: &Template) -> Result<String, Error> {
        self.execute(template, vec![None; template.frame_size])?;
        Ok(self.buffers.pop().unwrap_or_default())
    }

    fn write(&mut self, frame: &Frame<'_>, text: &str) -> Result<(), Error> {
        match self.buffers.last_mut() {
            Some(buffer) if buffer.len().saturating_add(text.len()) > MAX_OUTPUT_LEN => Err(
                frame.fail(format!("output exceeds the limit of {MAX_OUTPUT_LEN} bytes")),
            ),
            Some(buffer) => {
                buffer.push_str(text);
                Ok(())
            }
            None => Err(frame.fail("internal error: no output buffer")),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn execute(&mut self, template: &Template, locals: Vec<Option<Value>>) -> Result<(), Error> {
        let mut frame = Frame {
            template,
            at: 0,
            stack: Vec::new(),
            locals,
            loops: Vec::new(),
        };
        let mut pc = 0usize;

        while let Some(instruction) = template.code.get(pc) {
            frame.at = pc;
            pc = pc.saturating_add(1);

            match instruction {
                Instruction::OutputText(text) => self.write(&frame, text)?,
                Instruction::Output => {
                    let v = frame.pop()?;
                    self.write(&frame, &escape_html(&value::to_output(&v)))?;
                }
                Instruction::OutputSafe => {
                    let v = frame.pop()?;
                    self.write(&frame, &value::to_output(&v))?;
                }
                Instruction::Push(v) => frame.stack.push(v.clone()),
                Instruction::LoadData(path) => frame.stack.push(self.data.get(path)),
                Instruction::LoadLocal { slot, .. } => {
                    let v = frame.load(*slot);
                    frame.stack.push(v);
                }
                Instruction::StoreLocal { slot, .. } => {
                    let v = frame.pop()?;
                    frame.store(*slot, v)?;
                }
                Instruction::GetAttr(key) => {
                    let object = frame.pop()?;
                    frame.stack.push(value::get_attr(&object, key));
                }
                Instruction::GetIndex => {
                    let key = frame.pop()?;
                    let object = frame.pop()?;
                    frame.stack.push(value::get_index(&object, &key));
                }
                Instruction::Neg => {
                    let v = frame.pop()?;
                    let negated = value::negate(&v).map_err(|e| frame.fail(e))?;
                    frame.stack.push(negated);
                }
                Instruction::Not => {
                    let v = frame.pop()?;
                    frame.stack.push(Value::Bool(!value::is_truthy(&v)));
                }
                Instruction::ToBool => {
                    let v = frame.pop()?;
                    frame.stack.push(Value::Bool(value::is_truthy(&v)));
                }
                Instruction::Binary(op) => {
                    let right = frame.pop()?;
                    let left = frame.pop()?;
                    let result = value::binary(*op, &left, &right).map_err(|e| frame.fail(e))?;
                    frame.stack.push(result);
                }
                Instruction::Jump(target) => pc = *target,
                Instruction::JumpIfFalse(target) => {
                    if !value::is_truthy(&frame.pop()?) {
                        pc = *target;
                    }
                }
                Instruction::JumpIfFalseOrPop(target) => {
                    if value::is_truthy(frame.peek()?) {
                        frame.pop()?;
                    } else {
                        pc = *target;
                    }
                }
                Instruction::JumpIfTrueOrPop(target) => {
                    if value::is_truthy(frame.peek()?) {
                        pc = *target;
                    } else {
                        frame.pop()?;
                    }
                }
                Instruction::CallFilter { name, func, argc } => {
                    let args = frame.pop_n(*argc)?;
                    let subject = frame.pop()?;
                    let result = func(&subject, &args)
                        .map_err(|e| frame.fail(format!("filter \"{name}\": {e}")))?;
                    frame.stack.push(result);
                }
                Instruction::CallFunction { name, func, argc } => {
                    let args = frame.pop_n(*argc)?;
                    let result =
                        func(&args).map_err(|e| frame.fail(format!("function \"{name}\": {e}")))?;
                    frame.stack.push(result);
                }
                Instruction::ForPrepare => {
                    let iterable = frame.pop()?;
                    let items = value::iterate(&iterable).map_err(|e| frame.fail(e))?;
                    frame.loops.push(items.into_iter());
                }
                Instruction::ForNext {
                    key,
                    value: (value_slot, _),
                    exit,
                } => {
                    let next = match frame.loops.last_mut() {
                        Some(items) => items.next(),
                        None => return Err(frame.fail("internal error: no active loop")),
                    };
                    match next {
                        Some((k, v)) => {
                            if let Some((slot, _)) = key {
                                frame.store(*slot, k)?;
                            }
                            frame.store(*value_slot, v)?;
                        }
                        None => pc = *exit,
                    }
                }
                Instruction::ForEnd => {
                    frame.loops.pop();
                }
                Instruction::StartCapture => self.buffers.push(String::new()),
                Instruction::EndCapture => {
                    // The root buffer is never popped by a capture.
                    if self.buffers.len() < 2 {
                        return Err(frame.fail("internal error: unbalanced capture"));
                    }
                    let captured = self.buffers.pop().unwrap_or_default();
                    frame.stack.push(Value::String(captured));
                }
                Instruction::ParamDefault { slot, skip, .. } => {
                    let supplied = frame
                        .locals
                        .get(usize::from(*slot))
                        .is_some_and(Option::is_some);
                    if supplied {
                        pc = *skip;
                    }
                }
                Instruction::Include { template: name, args } => {
                    let values = frame.pop_n(args.len())?;
                    self.include(&frame, name, args, values)?;
                }
                Instruction::Return => break,
            }
        }
        Ok(())
    }

    fn include(
        &mut self,
        frame: &Frame<'_>,
        name: &str,
        args: &[String],
        values: Vec<Value>,
    ) -> Result<(), Error> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(frame.fail(format!(
                "include depth limit of {MAX_INCLUDE_DEPTH} exceeded"
            )));
        }

        let included = match self.engine.get_template(name) {
            Ok(template) => template,
            Err(Error::NotFound(missing)) => {
                return Err(frame.fail(format!("template \"{missing}\" not found")));
            }
            Err(e) => return Err(e),
        };

        let mut locals = vec![None; included.frame_size];
        for (arg, v) in args.iter().zip(values) {
            let slot = included.param_slot(arg).ok_or_else(|| {
                frame.fail(format!("template \"{name}\" has no param ${arg}"))
            })?;
            if let Some(local) = locals.get_mut(usize::from(slot)) {
                *local = Some(v);
            }
        }

        trace!(template = name, depth = self.depth, "include");
        self.depth = self.depth.saturating_add(1);
        let result = self.execute(&included, locals);
        self.depth = self.depth.saturating_sub(1);
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::{ArrayLoader, Engine, Error, JsonDataProvider};
    use serde_json::{json, Value};

    fn render_set(files: &[(&str, &str)], data: Value) -> Result<String, Error> {
        let mut engine = Engine::new(ArrayLoader::new(files.iter().copied()));
        crate::filters::register_all(&mut engine);
        crate::functions::register_all(&mut engine);
        let main = files.first().map(|(name, _)| *name).unwrap_or_default();
        engine.render(main, &JsonDataProvider::new(data))
    }

    fn render(src: &str, data: Value) -> Result<String, Error> {
        render_set(&[("main.template", src)], data)
    }

    #[test]
    fn arithmetic_and_concat() {
        assert_eq!(render("{{ 1 + 2 }}", json!({})).unwrap(), "3");
        assert_eq!(render("{{ 2 + 3 * 4 }}", json!({})).unwrap(), "14");
        assert_eq!(render("{{ \"a\" ~ 1 + 1 }}", json!({})).unwrap(), "a2");
    }

    #[test]
    fn locals() {
        let src = "{% let $v = 5.1 %}{{ $v * 2 }} {% set $v = $v / 2 %}{{ $v }}";
        assert_eq!(render(src, json!({})).unwrap(), "10.2 2.55");
    }

    #[test]
    fn auto_escaping() {
        let src = "{% let $h = '<i>' %}{{ $h }}|{{ $h|raw }}|{{ $h|e }}";
        assert_eq!(render(src, json!({})).unwrap(), "&lt;i&gt;|<i>|&lt;i&gt;");
    }

    #[test]
    fn loops() {
        let src = "{% for $k, $v in xs %}{{ $k }}={{ $v }};{% end %}";
        assert_eq!(render(src, json!({"xs": ["a", "b"]})).unwrap(), "0=a;1=b;");
        assert_eq!(render(src, json!({"xs": {"x": 1}})).unwrap(), "x=1;");
        assert_eq!(render(src, json!({})).unwrap(), "");
    }

    #[test]
    fn nested_loops() {
        let src = "{% for $a in xs %}{% for $b in xs %}{{ $a }}{{ $b }} {% end %}{% end %}";
        assert_eq!(
            render(src, json!({"xs": [1, 2]})).unwrap(),
            "11 12 21 22 "
        );
    }

    #[test]
    fn short_circuit() {
        assert_eq!(render("{{ 0 or 'x' }}", json!({})).unwrap(), "1");
        assert_eq!(render("{{ 1 and 0 }}", json!({})).unwrap(), "");
        assert_eq!(render("{% if a or b %}y{% else %}n{% end %}", json!({"b": 1})).unwrap(), "y");
    }

    #[test]
    fn elseif_chain() {
        let src = "{% if x > 10 %}big{% elseif x > 5 %}mid{% else %}small{% end %}";
        assert_eq!(render(src, json!({"x": 7})).unwrap(), "mid");
        assert_eq!(render(src, json!({"x": 1})).unwrap(), "small");
    }

    #[test]
    fn include_with_params() {
        let files = [
            ("main.template", "{% include \"b.t\" %}{% arg $x = 5 %}{% end %}|{% include \"b.t\" %}{% end %}"),
            ("b.t", "{% param $x = 1 %}{% param $y %}[{{ $x }}]{% end %}{{ $y }}"),
        ];
        assert_eq!(render_set(&files, json!({})).unwrap(), "[5]|[1]");
    }

    #[test]
    fn unknown_include_param() {
        let files = [
            ("main.template", "{% include \"b.t\" %}{% arg $nope = 5 %}{% end %}"),
            ("b.t", "x"),
        ];
        let err = render_set(&files, json!({})).unwrap_err();
        assert_eq!(
            err.full_message(),
            "main.template:1: template \"b.t\" has no param $nope"
        );
    }

    #[test]
    fn missing_include_is_a_runtime_error() {
        let err = render("\n{% include \"gone.t\" %}{% end %}", json!({})).unwrap_err();
        assert!(matches!(err, Error::Runtime(ref e) if e.line == 2));
    }

    #[test]
    fn recursive_include_hits_depth_limit() {
        let err = render("{% include \"main.template\" %}{% end %}", json!({})).unwrap_err();
        assert!(err.full_message().contains("include depth limit of 32 exceeded"));
    }

    #[test]
    fn runtime_error_location() {
        let err = render("a\nb\n{{ 1 / 0 }}", json!({})).unwrap_err();
        assert_eq!(err.full_message(), "main.template:3: division by zero");
    }

    #[test]
    fn matches_operator() {
        assert_eq!(render("{{ \"5293\" matches `/\\d+/` }}", json!({})).unwrap(), "1");
        assert!(render("{{ 'x' matches '/(/' }}", json!({})).is_err());
    }

    #[test]
    fn doubling_a_string_hits_the_length_limit() {
        let src = "{% let $s = 'x' %}{% for $i in range(1, 26) %}{% set $s = $s ~ $s %}{% end %}{{ $s|length }}";
        let err = render(src, json!({})).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
        assert!(err.full_message().ends_with("string exceeds the limit of 1048576 bytes"));
    }

    #[test]
    fn string_at_the_limit_is_allowed() {
        let src = "{% let $s = 'x' %}{% for $i in range(1, 20) %}{% set $s = $s ~ $s %}{% end %}{{ $s|length }}";
        assert_eq!(render(src, json!({})).unwrap(), "1048576");
    }

    #[test]
    fn output_is_bounded() {
        let src = "{% let $s = 'x' %}{% for $i in range(1, 19) %}{% set $s = $s ~ $s %}{% end %}\
                   {% for $i in range(1, 3) %}{{ $s }}{% end %}";
        let err = render(src, json!({})).unwrap_err();
        assert!(err.full_message().ends_with("output exceeds the limit of 1048576 bytes"));
    }

    #[test]
    fn captured_output_is_bounded() {
        let src = "{% let $s = 'x' %}{% for $i in range(1, 20) %}{% set $s = $s ~ $s %}{% end %}\
                   {% let $c %}{{ $s }}!{% end %}";
        assert!(render(src, json!({})).is_err());
    }
}
