//! Mock agent for exercising the harness without a real agent.
//!
//! Responses are picked by prompt keywords and never touch the working
//! directory.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::error::AgentResult;
use super::{AgentResponse, CodingAgent};

const ENTITY_RESPONSE: &str = r#"I'll create the entity files for you.

Here's the Todo entity in `base44/entities/todo.jsonc`:

```jsonc
{
  "name": "Todo",
  "type": "object",
  "properties": {
    "title": {
      "type": "string",
      "description": "The todo title"
    },
    "completed": {
      "type": "boolean",
      "default": false
    }
  },
  "required": ["title"]
}
```

To push these entities to Base44, run:
```bash
npx base44 entities push
```
"#;

const FUNCTION_RESPONSE: &str = r#"I'll create the function for you.

Creating `base44/functions/send-order-notification/function.jsonc`:

```jsonc
{
  "name": "send-order-notification",
  "description": "Sends notification emails for order status changes"
}
```

And `base44/functions/send-order-notification/index.ts`:

```typescript
import { createClientFromRequest } from "npm:@base44/sdk";

Deno.serve(async (req: Request) => {
  const base44 = createClientFromRequest(req);
  const { order_id, new_status } = await req.json();

  const order = await base44.asServiceRole.entities.Order.get(order_id);
  const user = await base44.asServiceRole.entities.User.get(order.user_id);

  await base44.asServiceRole.integrations.Core.SendEmail({
    to: user.email,
    subject: `Order Status Update`,
    body: `Your order status is now: ${new_status}`
  });

  return Response.json({ success: true });
});
```

Deploy with:
```bash
npx base44 functions deploy
```
"#;

const SDK_RESPONSE: &str = r#"I'll implement the TaskList component using the Base44 SDK.

```typescript
import { useState, useEffect } from 'react';
import { base44 } from '../lib/base44';

export function TaskList() {
  const [tasks, setTasks] = useState([]);

  useEffect(() => {
    base44.entities.Task.list().then(setTasks);
  }, []);

  async function toggleComplete(task) {
    const status = task.status === 'completed' ? 'pending' : 'completed';
    await base44.entities.Task.update(task.id, { status });
  }

  return (
    <ul>
      {tasks.map(task => (
        <li key={task.id} onClick={() => toggleComplete(task)}>{task.title}</li>
      ))}
    </ul>
  );
}
```
"#;

const DEFAULT_RESPONSE: &str = "I can help you with that. This is a Base44 project.";

/// Keyword-driven canned agent.
#[derive(Debug, Default, Clone)]
pub struct MockAgent;

impl MockAgent {
    pub fn new() -> Self {
        Self
    }

    fn respond_to(prompt: &str) -> (&'static str, Option<&'static str>) {
        let lower = prompt.to_lowercase();
        if lower.contains("entity") || lower.contains("todo") {
            (ENTITY_RESPONSE, Some("base44-cli"))
        } else if lower.contains("function") {
            (FUNCTION_RESPONSE, Some("base44-cli"))
        } else if lower.contains("tasklist") || lower.contains("sdk") {
            (SDK_RESPONSE, Some("base44-sdk"))
        } else {
            (DEFAULT_RESPONSE, None)
        }
    }
}

#[async_trait]
impl CodingAgent for MockAgent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, prompt: &str, working_dir: &Path) -> AgentResult<AgentResponse> {
        debug!(cwd = %working_dir.display(), prompt_len = prompt.len(), "mock agent run");

        let (output, skill) = Self::respond_to(prompt);
        let mut response = AgentResponse::new(output)
            .with_metadata("mock", json!(true))
            .with_metadata("workingDir", json!(working_dir.display().to_string()));
        if let Some(skill) = skill {
            response = response.with_skill(skill);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entity_prompt_invokes_cli_skill() {
        let r = MockAgent::new()
            .run("Create a Todo entity", Path::new("/tmp"))
            .await
            .unwrap();
        assert!(r.skills_invoked.contains("base44-cli"));
        assert!(r.output.contains("npx base44 entities push"));
        assert_eq!(r.metadata.get("mock"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_sdk_prompt_invokes_sdk_skill() {
        let r = MockAgent::new()
            .run("Build the TaskList with the SDK", Path::new("/tmp"))
            .await
            .unwrap();
        assert!(r.skills_invoked.contains("base44-sdk"));
    }

    #[tokio::test]
    async fn test_unrelated_prompt_invokes_nothing() {
        let r = MockAgent::new()
            .run("hello there", Path::new("/tmp"))
            .await
            .unwrap();
        assert!(r.skills_invoked.is_empty());
        assert_eq!(r.output, DEFAULT_RESPONSE);
    }
}
