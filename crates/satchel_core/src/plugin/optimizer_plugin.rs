use std::fmt::Debug;

use crate::types::Bundle;

/// Post-processes packaged script content before it is written to disk.
///
/// Optimizers run on final packaged output and must not alter the module's
/// observable export shape.
pub trait OptimizerPlugin: Debug + Send + Sync {
  fn optimize(&self, bundle: &Bundle, contents: String) -> Result<String, anyhow::Error>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug)]
  struct TestOptimizerPlugin {}

  impl OptimizerPlugin for TestOptimizerPlugin {
    fn optimize(&self, _bundle: &Bundle, contents: String) -> Result<String, anyhow::Error> {
      Ok(contents)
    }
  }

  #[test]
  fn can_be_dyn() {
    let _optimizer: Box<dyn OptimizerPlugin> = Box::new(TestOptimizerPlugin {});
  }
}
