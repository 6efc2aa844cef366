//! Agent roster. Each role's persona and task template.

use crate::agent::AgentSpec;

pub const PLANNER: AgentSpec = AgentSpec {
    key: "planner",
    name: "Product Planner",
    description: "Turn the raw idea into a clear product concept with target users, \
                  problems, value propositions, and success metrics",
    trace_label: "High-level product strategy",
    instructions: PLANNER_TASK,
};

pub const CHAIN: AgentSpec = AgentSpec {
    key: "chain",
    name: "Blockchain Architect",
    description: "Choose a chain, token model, and high-level Web3 integration for the product. \
                  Optimize for the chosen ecosystem and developer experience when relevant",
    trace_label: "Chain / tokenomics / Web3 flows",
    instructions: CHAIN_TASK,
};

pub const APP: AgentSpec = AgentSpec {
    key: "app",
    name: "Full-Stack Architect",
    description: "Design the required frontend components, backend services, APIs, and data flows \
                  to implement the product, including where Web3 interactions live",
    trace_label: "Frontend + backend + API design",
    instructions: APP_TASK,
};

pub const CONTRACTS: AgentSpec = AgentSpec {
    key: "contracts",
    name: "Smart Contract Engineer",
    description: "Propose the concrete smart contracts needed and their responsibilities. \
                  Keep them minimal but realistic for a testnet deployment",
    trace_label: "On-chain contract design",
    instructions: CONTRACTS_TASK,
};

pub const TOKENOMICS: AgentSpec = AgentSpec {
    key: "tokenomics",
    name: "Tokenomics Designer",
    description: "Design a simple, sane token distribution for the protocol, only if \
                  a token actually makes sense based on the planner and chain outputs",
    trace_label: "Simple token distribution (if a token is needed)",
    instructions: TOKENOMICS_TASK,
};

pub const CODE: AgentSpec = AgentSpec {
    key: "code",
    name: "Code Generator",
    description: "Generate a JSON plan of minimal but runnable code files for smart contracts and a simple app",
    trace_label: "Repository source files",
    instructions: CODE_TASK,
};

pub const SECURITY: AgentSpec = AgentSpec {
    key: "security",
    name: "Security Auditor",
    description: "Review the proposed smart contracts and generated code for common Web3 security issues \
                  and provide a concise risk assessment",
    trace_label: "Security review",
    instructions: SECURITY_TASK,
};

const PLANNER_TASK: &str = r#"
Return JSON like:
{
  "summary": "One paragraph summary of the product (max 80 words).",
  "user_segments": ["segment 1", "segment 2"],
  "value_proposition": ["value 1", "value 2"],
  "problems": ["problem 1", "problem 2"],
  "success_metrics": ["metric 1", "metric 2"]
}

Constraints:
- Each array must have AT MOST 4 items.
- Each item must be a short phrase (max ~12 words).
- Focus ONLY on the core product and main users, not every possible persona.
"#;

const CHAIN_TASK: &str = r#"
Using the 'planner' output and the raw idea, choose the BEST chain and Web3 stack for this specific product.

Responsibilities:
1) Choose `recommended_chain` and `web3_library`.
2) Decide whether this product truly needs its own fungible protocol token.
3) Describe at a high level how Web3 will be integrated.

Set `token_and_governance.need_token = true` if ANY of these hold:
- The product is a DeFi protocol (DEX, lending, yield, liquidity pools, derivatives, stablecoins).
- The idea explicitly mentions issuing a token, a reward token, or transferable on-chain points.
- Governance is meant to be decentralized (DAO, token voting, on-chain governance).
- Users earn or stake a transferable, redeemable on-chain asset.

Set `token_and_governance.need_token = false` if ANY of these hold:
- The app works with NFTs plus the native gas token or existing stablecoins (ticketing, simple marketplaces, on-chain records).
- Payments can be handled entirely with existing tokens (ETH, USDC).
- A new token would only be vanity branding with no real utility.

Chain selection:
- Weigh security needs, transaction volume, fee sensitivity, composability and developer experience.
- Candidates include Ethereum mainnet, L2s such as Base, Optimism and Arbitrum, and sidechains such as Polygon.
  Pick another chain if it is clearly a better fit.

Web3 library: pick exactly one of "ethers.js" or "web3.js".

Return JSON like:
{
  "recommended_chain": "Base",
  "web3_library": "ethers.js",
  "rationale": "One or two short sentences explaining why this chain fits this idea.",
  "web3_integration": [
    "wallet connection approach",
    "how users sign / pay for transactions",
    "where important state is stored (on-chain vs off-chain)",
    "infra such as RPC provider or indexer"
  ],
  "token_and_governance": {
    "need_token": true,
    "token_type": "utility",
    "governance_model": "admin multisig at MVP, with future DAO"
  },
  "alternative_chains": [
    {"name": "Polygon", "when_to_use": "Better if the app is NFT-heavy or gaming-focused."}
  ]
}

Constraints:
- Genuinely choose the best chain for THIS product; do NOT automatically default to Base.
- "recommended_chain" is a single chain name.
- "web3_integration": MAX 4 items, each a short phrase.
- "alternative_chains": at most 2 items.
- Always set "token_and_governance.need_token" explicitly to true or false.
"#;

const APP_TASK: &str = r#"
Using 'planner' and 'chain' outputs, design the app architecture.

Return JSON like:
{
  "frontend_components": [
    "Landing page with hero, CTA, and idea input form",
    "Dashboard showing generated framework and project status"
  ],
  "backend_services": [
    "Service that calls LLM to generate frameworks",
    "Service that stores user projects in a database"
  ],
  "api_endpoints": [
    {"method": "POST", "path": "/api/generate-framework", "description": "generate framework for an idea"}
  ],
  "next_steps": [
    "Validate idea with 3-5 target users",
    "Build core MVP screens only",
    "Deploy contracts to testnet and test basic flows"
  ]
}

Constraints:
- frontend_components: MAX 5 items, each one concrete screen or section.
- backend_services: MAX 5 items.
- api_endpoints: MAX 5 endpoints, ideally around 4.
- next_steps: MAX 5 steps on the shortest path to an MVP.
"#;

const CONTRACTS_TASK: &str = r#"
Using 'planner', 'chain', and 'app' outputs, design the smart contracts.

Return JSON like:
{
  "contracts": [
    {
      "name": "ProjectRegistry",
      "description": "Stores user projects with metadata and owner addresses.",
      "key_functions": ["createProject(string metadataURI)", "setStatus(uint256 id, uint8 status)"],
      "events": ["ProjectCreated(uint256 id, address owner)"]
    }
  ]
}

Constraints:
- MAX 2-3 contracts total.
- key_functions: MAX 5 per contract.
- events: MAX 5 per contract.
- Only include contracts that are absolutely necessary for the core product.
"#;

const TOKENOMICS_TASK: &str = r#"
Using 'planner' and 'chain' outputs:

First inspect `chain.token_and_governance.need_token` if it is present in the shared context.

If it is explicitly false, OR you conclude on your own that a token is unnecessary, return ONLY:
{"hasToken": false}

Do NOT include any other fields in that case.

If a token DOES make sense, return:
{
  "hasToken": true,
  "tokenSymbol": "HELP",
  "totalSupply": 1000000000,
  "allocations": [
    {"label": "Team", "percent": 25, "description": "Core contributors & ops"},
    {"label": "Investors", "percent": 15, "description": "Strategic backers"},
    {"label": "Community", "percent": 35, "description": "Incentives, airdrops, liquidity"},
    {"label": "Treasury", "percent": 15, "description": "Long-term runway & ecosystem"},
    {"label": "Advisors", "percent": 5, "description": "Strategic advisors"},
    {"label": "Ecosystem", "percent": 5, "description": "Partnerships & integrations"}
  ],
  "healthSummary": "One-sentence summary of whether this is balanced."
}

Create a token when the product is a DeFi protocol, when a protocol token is expected for rewards,
staking or liquidity, when governance should be community-driven, or when a transferable in-app
currency is used across many protocol features.
Do NOT create a token when the app is mostly NFTs, tickets, simple records or a marketplace that
works with native gas tokens or established stablecoins.

Constraints:
- 5-8 allocation categories unless the project truly needs fewer (minimum 4).
- Percents should roughly add up to 100; they are normalized afterwards.
- tokenSymbol: 3-10 uppercase letters.
"#;

const CODE_TASK: &str = r#"
Using the 'framework' object, generate a JSON plan of concrete source files that ALWAYS follows this repo layout:

- backend/main.py
- contracts/TicketNFT.sol
- contracts/TicketMarketplace.sol
- contracts/TicketValidator.sol
- frontend/src/main.tsx
- frontend/src/App.tsx
- hardhat.config.js
- package.json
- scripts/deploy.js
- test/smoke.test.js
- web3/connection.js
- README.md (optional, only if useful)

Return JSON EXACTLY in this shape:
{
  "contracts": [
    {"path": "contracts/TicketNFT.sol", "content": "pragma solidity ^0.8.20; contract TicketNFT { ... }"},
    {"path": "contracts/TicketMarketplace.sol", "content": "..."},
    {"path": "contracts/TicketValidator.sol", "content": "..."}
  ],
  "backend": [
    {"path": "backend/main.py", "content": "..."},
    {"path": "hardhat.config.js", "content": "..."},
    {"path": "package.json", "content": "..."},
    {"path": "scripts/deploy.js", "content": "..."},
    {"path": "test/smoke.test.js", "content": "..."},
    {"path": "web3/connection.js", "content": "// uses <DEPLOYED_CONTRACT_ADDRESS> ..."}
  ],
  "frontend": [
    {"path": "frontend/src/main.tsx", "content": "..."},
    {"path": "frontend/src/App.tsx", "content": "..."}
  ]
}

Constraints:
- Use exactly those paths, relative to the repo root.
- Solidity must compile with Solidity ^0.8.x; constructors take no arguments.
- The Python backend must be valid and runnable (no pseudo-code).
- JS/TS files must be valid TypeScript/JavaScript.
- Keep each file short and focused.
- Only the top-level keys 'contracts', 'backend', 'frontend'. Do NOT change the structure.
"#;

const SECURITY_TASK: &str = r#"
Using the 'framework' and 'code' outputs, perform a high-level security review.

Return JSON like:
{
  "risk_level": "low" | "medium" | "high",
  "critical_issues": ["Issue description 1"],
  "warnings": ["Warning 1"],
  "recommendations": ["Recommendation 1"]
}

Constraints:
- critical_issues, warnings, recommendations: MAX 3 items each.
- Each item is one concise sentence on the most important risks.
"#;

/// Framework agents in execution order. The last one is optional.
pub const FRAMEWORK_AGENTS: [&AgentSpec; 5] = [&PLANNER, &CHAIN, &APP, &CONTRACTS, &TOKENOMICS];
