//! Decoded API calls.

use crate::value::Value;

static NULL: Value = Value::Null;

/// One decoded call from a recorded trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Ordinal number of the call within the trace.
    pub no: u32,
    pub name: String,
    pub args: Vec<Value>,
    /// Return value; [`Value::Null`] when the call returns nothing.
    pub ret: Value,
    pub thread_id: u64,
}

impl Call {
    pub fn new(no: u32, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            no,
            name: name.into(),
            args,
            ret: Value::Null,
            thread_id: 0,
        }
    }

    pub fn with_ret(mut self, ret: Value) -> Self {
        self.ret = ret;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional argument access. Out-of-range indices read as
    /// [`Value::Null`], so a truncated call degrades instead of panicking.
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&NULL)
    }

    pub fn ret(&self) -> &Value {
        &self.ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn out_of_range_args_read_as_null() {
        let call = Call::new(1, "glDrawArrays", vec![Value::SInt(4)]);
        assert_eq!(call.arg(0).as_sint(), 4);
        assert!(call.arg(5).is_null());
        assert_eq!(call.arg(5).as_uint(), 0);
    }

    #[test]
    fn ret_defaults_to_null() {
        let call = Call::new(2, "glCreateShader", vec![]);
        assert!(call.ret().is_null());
        let call = call.with_ret(Value::UInt(7));
        assert_eq!(call.ret().as_uint(), 7);
    }
}
